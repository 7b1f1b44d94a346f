//! Frame lifecycle
//!
//! `begin_frame` opens the command list for a frame, `end_frame` presents,
//! issues the list and readies the other one. The back end only ever sees a
//! list after it was terminated.

use std::time::Instant;

use crate::foundation::logging::{debug, warn};
use crate::render::commands::{DrawBufferCommand, RenderToTextureCommand, VideoFrameCommand};
use crate::render::context::{AppliedSettings, RendererContext};
use crate::render::stats::Overflow;
use crate::render::RenderResult;

/// Timings of a finished frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTimings {
    /// From `begin_frame` to the list being issued
    pub front_end_ms: f64,
    /// Execution time of the most recently completed list
    pub back_end_ms: f64,
}

impl RendererContext {
    /// Start a frame.
    ///
    /// A changed texture mode or gamma drains the back end before it is
    /// applied.
    pub fn begin_frame(&mut self) -> RenderResult<()> {
        self.frame_start = Some(Instant::now());
        self.counters.frame_count += 1;
        self.counters.frame_scene_num = 0;
        self.counters.views_in_frame = 0;

        if self.config.texture_mode != self.applied.texture_mode || self.config.gamma != self.applied.gamma {
            self.issue_pending_render_commands()?;
            debug!(
                "Applying texture mode '{}' and gamma {}",
                self.config.texture_mode, self.config.gamma
            );
            self.applied = AppliedSettings {
                texture_mode: self.config.texture_mode.clone(),
                gamma: self.config.gamma,
            };
        }

        self.push_command(&DrawBufferCommand { buffer: 0 })
    }

    /// Present and issue the frame, then prepare the next one
    pub fn end_frame(&mut self) -> RenderResult<FrameTimings> {
        if !self.commands.current().push_swap_buffers()? {
            self.stats
                .overflow
                .record(Overflow::CommandBuffer, format_args!("Command list full, dropping SWAP_BUFFERS"));
        }

        self.stats.front_end_ms = self.frame_start.take().map_or(0.0, |start| start.elapsed().as_secs_f64() * 1000.0);
        let result = self.issue_render_commands(true);
        let timings = FrameTimings { front_end_ms: self.stats.front_end_ms, back_end_ms: self.stats.back_end_ms };
        self.init_next_frame();
        result.map(|()| timings)
    }

    /// Terminate the current list and hand it to the back end.
    ///
    /// With `run_perf` the back-end time of the last completed list is
    /// copied into the frame counters.
    pub fn issue_render_commands(&mut self, run_perf: bool) -> RenderResult<()> {
        self.stats.command_bytes = self.commands.current_ref().used();
        let result = self.commands.issue(self.config.skip_back_end);
        if run_perf {
            if let Some(report) = self.commands.last_report() {
                self.stats.back_end_ms = report.elapsed.as_secs_f64() * 1000.0;
            }
        }
        result
    }

    /// Flush pending commands and wait until the back end is idle
    pub fn issue_pending_render_commands(&mut self) -> RenderResult<()> {
        self.commands.issue_pending(self.config.skip_back_end)
    }

    /// Reset every frame-scoped array and switch command lists
    pub(crate) fn init_next_frame(&mut self) {
        self.commands.swap();
        self.scene.clear();
        self.draw_surfs.clear();
        self.interactions.clear();
        self.last_stats = self.stats.finish_frame(self.config.speeds);
    }

    /// Append `FINISH`
    pub fn finish(&mut self) -> RenderResult<()> {
        if !self.commands.current().push_finish()? {
            self.stats.overflow.record(Overflow::CommandBuffer, format_args!("Command list full, dropping FINISH"));
        }
        Ok(())
    }

    /// Append `VIDEOFRAME`
    pub fn take_video_frame(&mut self, width: u32, height: u32, encode: bool) -> RenderResult<()> {
        self.push_command(&VideoFrameCommand { width, height, encode: u32::from(encode) })
    }

    /// Append `RENDERTOTEXTURE`; an out-of-range slot is dropped with a warning
    pub fn render_to_texture(&mut self, texture: u32, x: i32, y: i32, width: i32, height: i32) -> RenderResult<()> {
        if texture as usize >= self.limits.max_render_textures {
            warn!("render_to_texture: bad texture slot {texture}");
            return Ok(());
        }
        self.push_command(&RenderToTextureCommand { texture, x, y, width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RendererConfig, RendererLimits};
    use crate::render::backend::{RecordedCommand, RecordingBackEnd};
    use crate::render::commands::RenderCommand;

    fn context(config: RendererConfig) -> (RendererContext, RecordingBackEnd) {
        let recorder = RecordingBackEnd::new();
        let ctx = RendererContext::inline(config, RendererLimits::default(), recorder.clone()).unwrap();
        (ctx, recorder)
    }

    #[test]
    fn test_empty_frame_draws_and_presents() {
        let (mut ctx, recorder) = context(RendererConfig::default());
        ctx.begin_frame().unwrap();
        ctx.end_frame().unwrap();

        assert_eq!(
            recorder.recorded(),
            vec![
                RecordedCommand::Command(RenderCommand::DrawBuffer(DrawBufferCommand { buffer: 0 })),
                RecordedCommand::Command(RenderCommand::SwapBuffers),
            ]
        );
        assert_eq!(ctx.counters().frame_count, 1);
        assert!(!ctx.command_list().has_pending());
        assert_eq!(ctx.last_stats().command_bytes, 8 + 4);
    }

    #[test]
    fn test_skip_back_end_executes_nothing() {
        let (mut ctx, recorder) = context(RendererConfig { skip_back_end: true, ..Default::default() });
        ctx.begin_frame().unwrap();
        ctx.finish().unwrap();
        ctx.end_frame().unwrap();
        assert!(recorder.recorded().is_empty());
        assert!(!ctx.command_list().has_pending());
    }

    #[test]
    fn test_gamma_change_flushes_before_the_frame() {
        let (mut ctx, recorder) = context(RendererConfig::default());
        ctx.take_video_frame(320, 200, true).unwrap();
        ctx.config_mut().gamma = 1.4;
        ctx.begin_frame().unwrap();

        // The capture ran before the new frame's first command was written.
        assert_eq!(recorder.recorded().len(), 1);
        assert_eq!(ctx.applied.gamma, 1.4);
        assert!(ctx.command_list().has_pending());
    }

    #[test]
    fn test_bad_texture_slot_is_dropped() {
        let (mut ctx, _) = context(RendererConfig::default());
        let slots = ctx.limits().max_render_textures as u32;
        ctx.render_to_texture(slots, 0, 0, 64, 64).unwrap();
        assert!(!ctx.command_list().has_pending());

        ctx.render_to_texture(slots - 1, 0, 0, 64, 64).unwrap();
        assert!(ctx.command_list().has_pending());
    }

    #[test]
    fn test_frame_counters_reset_between_frames() {
        let (mut ctx, _) = context(RendererConfig::default());
        for _ in 0..2 {
            ctx.begin_frame().unwrap();
            ctx.counters.views_in_frame = 3;
            ctx.end_frame().unwrap();
        }
        ctx.begin_frame().unwrap();
        assert_eq!(ctx.counters().views_in_frame, 0);
        assert_eq!(ctx.counters().frame_count, 3);
        assert_eq!(ctx.stats().views, 0);
    }
}
