//! 2D drawing
//!
//! Pictures, gradients and 2D polygons go straight into the current command
//! list. An optional clip rectangle trims pictures before they are queued.

use crate::render::commands::{
    CommandPayload, PolyVert, RotatedPicCommand, SetColorCommand, StretchPicCommand, StretchPicGradientCommand,
};
use crate::render::context::RendererContext;
use crate::render::shader::ShaderHandle;
use crate::render::stats::Overflow;
use crate::render::RenderResult;

/// Opaque white
pub const WHITE: [f32; 4] = [1.0; 4];

/// 2D state carried between calls
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Draw2dState {
    /// `[left, top, right, bottom]`; inactive when empty
    pub clip_region: Option<[f32; 4]>,
    /// Last color sent with `set_color`
    pub color: Option<[f32; 4]>,
}

/// Screen rectangle and texture window of a picture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pic {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub w: f32,
    /// Height
    pub h: f32,
    /// Left texture coordinate
    pub s1: f32,
    /// Top texture coordinate
    pub t1: f32,
    /// Right texture coordinate
    pub s2: f32,
    /// Bottom texture coordinate
    pub t2: f32,
}

impl Pic {
    /// Rectangle showing the whole texture
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h, s1: 0.0, t1: 0.0, s2: 1.0, t2: 1.0 }
    }

    /// Texture window
    pub const fn with_st(mut self, s1: f32, t1: f32, s2: f32, t2: f32) -> Self {
        self.s1 = s1;
        self.t1 = t1;
        self.s2 = s2;
        self.t2 = t2;
        self
    }

    fn command(&self, shader: ShaderHandle) -> StretchPicCommand {
        StretchPicCommand {
            shader: shader.into(),
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
            s1: self.s1,
            t1: self.t1,
            s2: self.s2,
            t2: self.t2,
        }
    }

    /// Trim against `[left, top, right, bottom]`, scaling texture
    /// coordinates with the cut.
    ///
    /// Returns `false` when nothing is left. An empty region clips nothing.
    pub fn clip(&mut self, region: &[f32; 4]) -> bool {
        let [clip_left, clip_top, clip_right, clip_bottom] = *region;
        if clip_right <= clip_left || clip_bottom <= clip_top {
            return true;
        }

        let left = self.x;
        let top = self.y;
        let right = self.x + self.w;
        let bottom = self.y + self.h;

        if right <= clip_left || left >= clip_right || bottom <= clip_top || top >= clip_bottom {
            return false;
        }

        if left < clip_left {
            let f = (clip_left - left) / (right - left);
            self.s1 += f * (self.s2 - self.s1);
            self.x = clip_left;
            self.w -= clip_left - left;
        }
        if right > clip_right {
            let f = (clip_right - right) / (left - right);
            self.s2 += f * (self.s1 - self.s2);
            self.w = clip_right - self.x;
        }
        if top < clip_top {
            let f = (clip_top - top) / (bottom - top);
            self.t1 += f * (self.t2 - self.t1);
            self.y = clip_top;
            self.h -= clip_top - top;
        }
        if bottom > clip_bottom {
            let f = (clip_bottom - bottom) / (top - bottom);
            self.t2 += f * (self.t1 - self.t2);
            self.h = clip_bottom - self.y;
        }
        true
    }
}

impl RendererContext {
    /// Append a command, counting it when the list is full
    pub(crate) fn push_command<T: CommandPayload>(&mut self, payload: &T) -> RenderResult<()> {
        if !self.commands.current().push(payload)? {
            self.stats.overflow.record(
                Overflow::CommandBuffer,
                format_args!("Command list full, dropping {:?}", T::TAG),
            );
        }
        Ok(())
    }

    /// Color of following 2D commands; `None` is opaque white
    pub fn set_color(&mut self, color: Option<[f32; 4]>) -> RenderResult<()> {
        self.draw2d.color = color;
        self.push_command(&SetColorCommand { color: color.unwrap_or(WHITE) })
    }

    /// Set or clear the rectangle pictures are clipped to
    pub fn set_clip_region(&mut self, region: Option<[f32; 4]>) {
        self.draw2d.clip_region = region;
    }

    /// Current 2D state
    pub fn draw2d_state(&self) -> &Draw2dState {
        &self.draw2d
    }

    /// Queue a picture, clipped to the clip region
    pub fn stretch_pic(&mut self, mut pic: Pic, shader: ShaderHandle) -> RenderResult<()> {
        if let Some(region) = self.draw2d.clip_region {
            if !pic.clip(&region) {
                return Ok(());
            }
        }
        self.push_command(&pic.command(shader))
    }

    /// Queue a picture rotated by `angle` degrees; never clipped
    pub fn rotated_pic(&mut self, pic: Pic, shader: ShaderHandle, angle: f32) -> RenderResult<()> {
        self.push_command(&RotatedPicCommand { pic: pic.command(shader), angle })
    }

    /// Queue a picture blending toward a second color; never clipped
    pub fn stretch_pic_gradient(
        &mut self,
        pic: Pic,
        shader: ShaderHandle,
        gradient_color: Option<[f32; 4]>,
        gradient_type: u32,
    ) -> RenderResult<()> {
        self.push_command(&StretchPicGradientCommand {
            pic: pic.command(shader),
            gradient_color: gradient_color.unwrap_or(WHITE),
            gradient_type,
        })
    }

    /// Queue a 2D polygon; the vertices are copied into the list's arena
    pub fn add_2d_polys(&mut self, verts: &[PolyVert], shader: ShaderHandle) -> RenderResult<()> {
        let list = self.commands.current();
        if verts.len() > list.poly_verts_remaining() {
            let max = list.max_poly_verts();
            self.stats.overflow.record(
                Overflow::Poly2dVerts,
                format_args!("Dropping 2D polygon, reached the limit of {max} vertices"),
            );
            return Ok(());
        }
        if !list.push_2d_polys(shader, verts)? {
            self.stats.overflow.record(Overflow::CommandBuffer, format_args!("Command list full, dropping 2D polygon"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RendererConfig, RendererLimits};
    use crate::render::backend::RecordingBackEnd;
    use crate::render::commands::RenderCommand;
    use approx::assert_relative_eq;

    fn context(limits: RendererLimits) -> RendererContext {
        RendererContext::inline(RendererConfig::default(), limits, RecordingBackEnd::new()).unwrap()
    }

    fn commands(ctx: &RendererContext) -> Vec<RenderCommand> {
        let mut list = ctx.command_list().clone();
        list.terminate();
        list.commands().map(Result::unwrap).collect()
    }

    #[test]
    fn test_clip_trims_left_edge_and_texture() {
        let mut pic = Pic::new(0.0, 0.0, 100.0, 100.0);
        assert!(pic.clip(&[50.0, 0.0, 200.0, 200.0]));
        assert_relative_eq!(pic.x, 50.0);
        assert_relative_eq!(pic.w, 50.0);
        assert_relative_eq!(pic.s1, 0.5);
        assert_relative_eq!(pic.s2, 1.0);
    }

    #[test]
    fn test_clip_trims_bottom_right() {
        let mut pic = Pic::new(0.0, 0.0, 100.0, 100.0);
        assert!(pic.clip(&[0.0, 0.0, 75.0, 25.0]));
        assert_relative_eq!(pic.w, 75.0);
        assert_relative_eq!(pic.h, 25.0);
        assert_relative_eq!(pic.s2, 0.75);
        assert_relative_eq!(pic.t2, 0.25);
    }

    #[test]
    fn test_clip_rejects_and_ignores_empty_region() {
        let mut pic = Pic::new(0.0, 0.0, 10.0, 10.0);
        assert!(!pic.clip(&[20.0, 0.0, 40.0, 40.0]));

        let mut untouched = Pic::new(0.0, 0.0, 10.0, 10.0);
        assert!(untouched.clip(&[5.0, 5.0, 5.0, 50.0]));
        assert_eq!(untouched, Pic::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_fully_clipped_pic_allocates_nothing() {
        let mut ctx = context(RendererLimits::default());
        let shader = ctx.shaders().default_handle();
        ctx.set_clip_region(Some([100.0, 100.0, 200.0, 200.0]));
        ctx.stretch_pic(Pic::new(0.0, 0.0, 10.0, 10.0), shader).unwrap();
        assert_eq!(ctx.command_list().used(), 0);

        // Rotated pictures ignore the region.
        ctx.rotated_pic(Pic::new(0.0, 0.0, 10.0, 10.0), shader, 45.0).unwrap();
        assert!(matches!(commands(&ctx)[..], [RenderCommand::RotatedPic(ref c)] if c.angle == 45.0));
    }

    #[test]
    fn test_colors_default_to_white() {
        let mut ctx = context(RendererLimits::default());
        let shader = ctx.shaders().default_handle();
        ctx.set_color(None).unwrap();
        ctx.stretch_pic_gradient(Pic::new(0.0, 0.0, 1.0, 1.0), shader, None, 2).unwrap();

        let cmds = commands(&ctx);
        assert_eq!(cmds[0], RenderCommand::SetColor(SetColorCommand { color: WHITE }));
        assert!(matches!(cmds[1], RenderCommand::StretchPicGradient(c) if c.gradient_color == WHITE && c.gradient_type == 2));
        assert_eq!(ctx.draw2d_state().color, None);
    }

    #[test]
    fn test_2d_vertex_arena_exhaustion() {
        let mut ctx = context(RendererLimits { max_2d_poly_verts: 4, ..Default::default() });
        let shader = ctx.shaders().default_handle();
        ctx.add_2d_polys(&[PolyVert::default(); 3], shader).unwrap();
        ctx.add_2d_polys(&[PolyVert::default(); 3], shader).unwrap();

        assert_eq!(commands(&ctx).len(), 1);
        assert_eq!(ctx.stats().overflow.count(Overflow::Poly2dVerts), 1);
    }
}
