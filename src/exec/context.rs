use std::sync::Arc;

use crate::foundation::core::Quality;
use crate::scene::cancel::CancelToken;
use crate::scene::model::{ColorDisplaySettings, ColorViewSettings, GraphDescription};

/// Caller-facing knobs for one execution request.
#[derive(Clone, Debug, Default)]
pub struct ExecuteOpts {
    /// Whether this is a final-render pass (true) or an interactive edit pass.
    pub rendering: bool,
    /// Hint that operations may trade accuracy for speed.
    pub fast_calculation: bool,
    /// Color-management view settings to carry on the context.
    pub view_settings: ColorViewSettings,
    /// Color-management display settings to carry on the context.
    pub display_settings: ColorDisplaySettings,
    /// View identifier for multi-view pipelines.
    pub view_name: String,
}

/// Immutable-after-construction execution configuration.
///
/// Shared by `Arc` between the executor, the execution model, and every
/// operation; none of them own it and none mutate it once execution begins.
#[derive(Debug)]
pub struct ExecutionContext {
    graph: Arc<GraphDescription>,
    cancel: CancelToken,
    quality: Quality,
    rendering: bool,
    fast_calculation: bool,
    accelerated: bool,
    view_settings: ColorViewSettings,
    display_settings: ColorDisplaySettings,
    view_name: String,
}

impl ExecutionContext {
    pub(crate) fn new(
        graph: Arc<GraphDescription>,
        opts: ExecuteOpts,
        cancel: CancelToken,
        accelerated: bool,
    ) -> Self {
        let quality = if opts.rendering {
            graph.render_quality
        } else {
            graph.edit_quality
        };
        Self {
            graph,
            cancel,
            quality,
            rendering: opts.rendering,
            fast_calculation: opts.fast_calculation,
            accelerated,
            view_settings: opts.view_settings,
            display_settings: opts.display_settings,
            view_name: opts.view_name,
        }
    }

    /// The source graph description.
    pub fn graph(&self) -> &GraphDescription {
        &self.graph
    }

    /// The cancellation probe for this execution.
    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    /// Resolved quality level (render quality when rendering, edit quality
    /// otherwise).
    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Whether this is a final-render pass.
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// Whether operations may trade accuracy for speed.
    pub fn fast_calculation(&self) -> bool {
        self.fast_calculation
    }

    /// Whether accelerated compute devices are present and the graph opted
    /// in to using them.
    pub fn has_accelerated_devices(&self) -> bool {
        self.accelerated
    }

    /// Color-management view settings.
    pub fn view_settings(&self) -> &ColorViewSettings {
        &self.view_settings
    }

    /// Color-management display settings.
    pub fn display_settings(&self) -> &ColorDisplaySettings {
        &self.display_settings
    }

    /// View identifier for multi-view pipelines.
    pub fn view_name(&self) -> &str {
        &self.view_name
    }
}
