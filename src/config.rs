use std::time::Duration;

/// What region-specific edits act on when no region is selected.
///
/// `FirstRegion` reproduces the established behaviour of applying margin,
/// match, click-point and type edits to region 0. It may be masking a missing
/// selection, so it can be switched off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionFallback {
    #[default]
    FirstRegion,
    None,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditorConfig {
    /// Smallest width/height a region can be resized to.
    pub min_size: i32,
    /// Distance from an edge that still counts as grabbing that edge.
    pub resize_margin: i32,
    pub click_point_radius: f64,
    /// Extra grab tolerance around the click point circle.
    pub click_point_slack: f64,
    pub redraw_interval: Duration,
    pub selection_fallback: SelectionFallback,
    pub default_margin: i32,
    pub default_match: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_size: 10,
            resize_margin: 5,
            click_point_radius: 10.0,
            click_point_slack: 3.0,
            redraw_interval: Duration::from_millis(30),
            selection_fallback: SelectionFallback::FirstRegion,
            default_margin: 50,
            default_match: 96.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiffConfig {
    /// Fraction of the width around the divider that grabs it.
    pub handle_threshold: f64,
    pub initial_divide: f64,
    pub label_size: f32,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            handle_threshold: 0.01,
            initial_divide: 0.5,
            label_size: 14.0,
        }
    }
}
