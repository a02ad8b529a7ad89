use smallvec::smallvec;

use crate::exec::buffer::{RegionBuffer, premultiply_rgba8};
use crate::exec::context::ExecutionContext;
use crate::exec::operation::{Operation, OperationId, OperationInputs};
use crate::foundation::core::Region;
use crate::scene::model::BlendMode;

fn mul_u8(a: u8, b: u8) -> u8 {
    ((u16::from(a) * u16::from(b) + 127) / 255) as u8
}

fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
}

fn blend_px(a: [u8; 4], b: [u8; 4], mode: BlendMode) -> [u8; 4] {
    let mut out = [0u8; 4];
    match mode {
        BlendMode::Over => {
            // b over a: out = b + a * (1 - alpha_b)
            let inv = 255 - b[3];
            for i in 0..4 {
                out[i] = b[i].saturating_add(mul_u8(a[i], inv));
            }
        }
        BlendMode::Add => {
            for i in 0..4 {
                out[i] = a[i].saturating_add(b[i]);
            }
        }
        BlendMode::Multiply => {
            for i in 0..4 {
                out[i] = mul_u8(a[i], b[i]);
            }
        }
        BlendMode::Screen => {
            for i in 0..4 {
                out[i] = 255 - mul_u8(255 - a[i], 255 - b[i]);
            }
        }
    }
    out
}

/// Fills its region with a constant color.
pub struct ColorFillOperation {
    color: [u8; 4],
    premul: [u8; 4],
}

impl ColorFillOperation {
    /// Build a fill from a straight RGBA8 color.
    pub fn new(color: [u8; 4]) -> Self {
        Self {
            color,
            premul: [0; 4],
        }
    }
}

impl Operation for ColorFillOperation {
    fn name(&self) -> &str {
        "color_fill"
    }

    fn init_data(&mut self, _ctx: &ExecutionContext) {
        self.premul = premultiply_rgba8(self.color);
    }

    fn inputs(&self) -> &[OperationId] {
        &[]
    }

    fn evaluate(
        &self,
        _ctx: &ExecutionContext,
        region: Region,
        _inputs: &[&RegionBuffer],
    ) -> RegionBuffer {
        let mut out = RegionBuffer::new(region);
        for y in region.y_min..region.y_max {
            out.fill_row(y, self.premul);
        }
        out
    }
}

/// Vertical gradient between a bottom and a top color.
pub struct GradientOperation {
    bottom: [u8; 4],
    top: [u8; 4],
    // One premultiplied color per canvas row, built in init_data. Evaluation
    // reads rows by absolute y, so tiles of any height agree on pixel values.
    rows: Vec<[u8; 4]>,
}

impl GradientOperation {
    /// Build a gradient from straight RGBA8 end colors.
    pub fn new(bottom: [u8; 4], top: [u8; 4]) -> Self {
        Self {
            bottom,
            top,
            rows: Vec::new(),
        }
    }
}

impl Operation for GradientOperation {
    fn name(&self) -> &str {
        "gradient"
    }

    fn init_data(&mut self, ctx: &ExecutionContext) {
        let height = ctx.graph().canvas.height as usize;
        let span = height.saturating_sub(1).max(1) as f64;
        self.rows = (0..height)
            .map(|y| {
                let t = y as f64 / span;
                let straight = [
                    lerp_u8(self.bottom[0], self.top[0], t),
                    lerp_u8(self.bottom[1], self.top[1], t),
                    lerp_u8(self.bottom[2], self.top[2], t),
                    lerp_u8(self.bottom[3], self.top[3], t),
                ];
                premultiply_rgba8(straight)
            })
            .collect();
    }

    fn inputs(&self) -> &[OperationId] {
        &[]
    }

    fn evaluate(
        &self,
        _ctx: &ExecutionContext,
        region: Region,
        _inputs: &[&RegionBuffer],
    ) -> RegionBuffer {
        let mut out = RegionBuffer::new(region);
        for y in region.y_min..region.y_max {
            let px = usize::try_from(y)
                .ok()
                .and_then(|row| self.rows.get(row))
                .copied()
                .unwrap_or([0; 4]);
            out.fill_row(y, px);
        }
        out
    }
}

/// Inverts the input's color channels within its alpha.
pub struct InvertOperation {
    inputs: OperationInputs,
}

impl InvertOperation {
    /// Build an invert over one upstream operation.
    pub fn new(input: OperationId) -> Self {
        Self {
            inputs: smallvec![input],
        }
    }
}

impl Operation for InvertOperation {
    fn name(&self) -> &str {
        "invert"
    }

    fn inputs(&self) -> &[OperationId] {
        &self.inputs
    }

    fn evaluate(
        &self,
        _ctx: &ExecutionContext,
        region: Region,
        inputs: &[&RegionBuffer],
    ) -> RegionBuffer {
        let mut out = RegionBuffer::new(region);
        let Some(src) = inputs.first() else {
            return out;
        };
        for y in region.y_min..region.y_max {
            for x in region.x_min..region.x_max {
                let [r, g, b, a] = src.pixel(x, y);
                // Straight-space inversion expressed on premultiplied
                // channels: a * (1 - c/a) == a - c.
                out.set_pixel(
                    x,
                    y,
                    [
                        a.saturating_sub(r),
                        a.saturating_sub(g),
                        a.saturating_sub(b),
                        a,
                    ],
                );
            }
        }
        out
    }
}

/// Scales the input's opacity by a constant factor.
pub struct OpacityOperation {
    inputs: OperationInputs,
    factor: f64,
}

impl OpacityOperation {
    /// Build an opacity scale over one upstream operation.
    pub fn new(input: OperationId, factor: f64) -> Self {
        Self {
            inputs: smallvec![input],
            factor,
        }
    }
}

impl Operation for OpacityOperation {
    fn name(&self) -> &str {
        "opacity"
    }

    fn inputs(&self) -> &[OperationId] {
        &self.inputs
    }

    fn evaluate(
        &self,
        _ctx: &ExecutionContext,
        region: Region,
        inputs: &[&RegionBuffer],
    ) -> RegionBuffer {
        let mut out = RegionBuffer::new(region);
        let Some(src) = inputs.first() else {
            return out;
        };
        let f = self.factor.clamp(0.0, 1.0);
        for y in region.y_min..region.y_max {
            for x in region.x_min..region.x_max {
                let px = src.pixel(x, y);
                // Premultiplied buffers scale uniformly across all channels.
                out.set_pixel(x, y, px.map(|c| (f64::from(c) * f).round() as u8));
            }
        }
        out
    }
}

/// Mixes two inputs under a blend mode.
pub struct MixOperation {
    inputs: OperationInputs,
    factor: f64,
    blend: BlendMode,
}

impl MixOperation {
    /// Build a mix of `a` and `b`. Factor 0 keeps `a`, 1 is the full blend.
    pub fn new(a: OperationId, b: OperationId, factor: f64, blend: BlendMode) -> Self {
        Self {
            inputs: smallvec![a, b],
            factor,
            blend,
        }
    }
}

impl Operation for MixOperation {
    fn name(&self) -> &str {
        "mix"
    }

    fn inputs(&self) -> &[OperationId] {
        &self.inputs
    }

    fn evaluate(
        &self,
        _ctx: &ExecutionContext,
        region: Region,
        inputs: &[&RegionBuffer],
    ) -> RegionBuffer {
        let mut out = RegionBuffer::new(region);
        let (Some(a), Some(b)) = (inputs.first(), inputs.get(1)) else {
            return out;
        };
        let f = self.factor.clamp(0.0, 1.0);
        for y in region.y_min..region.y_max {
            for x in region.x_min..region.x_max {
                let base = a.pixel(x, y);
                let blended = blend_px(base, b.pixel(x, y), self.blend);
                let mut px = [0u8; 4];
                for i in 0..4 {
                    px[i] = lerp_u8(base[i], blended[i], f);
                }
                out.set_pixel(x, y, px);
            }
        }
        out
    }
}

/// Final sink: passes its input through as the frame's pixels.
pub struct OutputOperation {
    inputs: OperationInputs,
}

impl OutputOperation {
    /// Build an output sink over one upstream operation.
    pub fn new(input: OperationId) -> Self {
        Self {
            inputs: smallvec![input],
        }
    }
}

impl Operation for OutputOperation {
    fn name(&self) -> &str {
        "output"
    }

    fn inputs(&self) -> &[OperationId] {
        &self.inputs
    }

    fn is_output(&self) -> bool {
        true
    }

    fn evaluate(
        &self,
        _ctx: &ExecutionContext,
        region: Region,
        inputs: &[&RegionBuffer],
    ) -> RegionBuffer {
        let mut out = RegionBuffer::new(region);
        if let Some(src) = inputs.first() {
            out.blit_from(src);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::context::{ExecuteOpts, ExecutionContext};
    use crate::foundation::core::Canvas;
    use crate::scene::cancel::CancelToken;
    use crate::scene::model::{GraphDescription, NodeDef, NodeKindDef};
    use std::sync::Arc;

    fn ctx(height: u32) -> ExecutionContext {
        let graph = Arc::new(GraphDescription {
            canvas: Canvas { width: 4, height },
            execution_model: Default::default(),
            render_quality: Default::default(),
            edit_quality: Default::default(),
            use_accelerated: false,
            nodes: vec![NodeDef {
                id: "out".to_owned(),
                kind: NodeKindDef::Output {
                    input: "out".to_owned(),
                },
            }],
        });
        ExecutionContext::new(graph, ExecuteOpts::default(), CancelToken::new(), false)
    }

    #[test]
    fn color_fill_premultiplies_in_init_data() {
        let ctx = ctx(4);
        let mut op = ColorFillOperation::new([200, 100, 0, 128]);
        op.init_data(&ctx);
        let out = op.evaluate(&ctx, Region::new(0, 2, 0, 2), &[]);
        assert_eq!(out.pixel(0, 0), [100, 50, 0, 128]);
        assert_eq!(out.pixel(1, 1), [100, 50, 0, 128]);
    }

    #[test]
    fn gradient_rows_depend_on_absolute_y() {
        let ctx = ctx(4);
        let mut op = GradientOperation::new([0, 0, 0, 255], [255, 255, 255, 255]);
        op.init_data(&ctx);

        let whole = op.evaluate(&ctx, Region::new(0, 4, 0, 4), &[]);
        let tile = op.evaluate(&ctx, Region::new(0, 4, 2, 4), &[]);
        assert_eq!(whole.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(whole.pixel(0, 3), [255, 255, 255, 255]);
        assert_eq!(whole.pixel(1, 2), tile.pixel(1, 2));
        assert_eq!(whole.pixel(3, 3), tile.pixel(3, 3));
    }

    #[test]
    fn invert_keeps_alpha_and_flips_color() {
        let ctx = ctx(2);
        let mut fill = ColorFillOperation::new([255, 0, 0, 255]);
        fill.init_data(&ctx);
        let region = Region::new(0, 2, 0, 2);
        let red = fill.evaluate(&ctx, region, &[]);

        let inv = InvertOperation::new(OperationId(0));
        let out = inv.evaluate(&ctx, region, &[&red]);
        assert_eq!(out.pixel(0, 0), [0, 255, 255, 255]);
    }

    #[test]
    fn opacity_scales_all_channels() {
        let ctx = ctx(2);
        let mut fill = ColorFillOperation::new([255, 255, 255, 255]);
        fill.init_data(&ctx);
        let region = Region::new(0, 2, 0, 2);
        let white = fill.evaluate(&ctx, region, &[]);

        let half = OpacityOperation::new(OperationId(0), 0.5);
        let out = half.evaluate(&ctx, region, &[&white]);
        assert_eq!(out.pixel(1, 1), [128, 128, 128, 128]);
    }

    #[test]
    fn mix_factor_endpoints_select_base_and_blend() {
        let ctx = ctx(2);
        let region = Region::new(0, 2, 0, 2);
        let mut red = ColorFillOperation::new([255, 0, 0, 255]);
        let mut green = ColorFillOperation::new([0, 255, 0, 255]);
        red.init_data(&ctx);
        green.init_data(&ctx);
        let a = red.evaluate(&ctx, region, &[]);
        let b = green.evaluate(&ctx, region, &[]);

        let keep = MixOperation::new(OperationId(0), OperationId(1), 0.0, BlendMode::Over);
        assert_eq!(keep.evaluate(&ctx, region, &[&a, &b]).pixel(0, 0), [255, 0, 0, 255]);

        let full = MixOperation::new(OperationId(0), OperationId(1), 1.0, BlendMode::Over);
        // b is opaque, so the full over blend is b.
        assert_eq!(full.evaluate(&ctx, region, &[&a, &b]).pixel(0, 0), [0, 255, 0, 255]);

        let add = MixOperation::new(OperationId(0), OperationId(1), 1.0, BlendMode::Add);
        assert_eq!(add.evaluate(&ctx, region, &[&a, &b]).pixel(0, 0), [255, 255, 0, 255]);
    }

    #[test]
    fn output_passes_its_input_through() {
        let ctx = ctx(2);
        let region = Region::new(0, 2, 0, 2);
        let mut fill = ColorFillOperation::new([10, 20, 30, 255]);
        fill.init_data(&ctx);
        let src = fill.evaluate(&ctx, region, &[]);

        let out_op = OutputOperation::new(OperationId(0));
        assert!(out_op.is_output());
        let out = out_op.evaluate(&ctx, region, &[&src]);
        assert_eq!(out.pixel(1, 0), src.pixel(1, 0));
    }
}
