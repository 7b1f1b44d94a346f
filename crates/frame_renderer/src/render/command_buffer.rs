//! # Command Lists
//!
//! Fixed-size byte buffers the front end fills and the back end drains. Two
//! lists exist; while the back end executes one, the front end writes the
//! other.
//!
//! ## Capacity rules
//!
//! - Every regular allocation leaves room for a `SWAP_BUFFERS` tag and the
//!   `END_OF_LIST` tag, so a frame can always be closed
//! - A request that does not fit is dropped, and so is every later regular
//!   request until the list is reset
//! - A request larger than the whole list is a programming error

use crate::render::commands::{
    decode_command, CommandPayload, CommandTag, DrawViewCommand, PolyVert, RenderCommand, TwoDPolysCommand,
    TAG_SIZE,
};
use crate::render::draw_surface::DrawSurf;
use crate::render::interaction::Interaction;
use crate::render::light::FrameLight;
use crate::render::shader::ShaderHandle;
use crate::render::view::{RefDef, ViewParms};
use crate::render::{RenderError, RenderResult};

/// A light as seen by one view, with its interactions in the snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ViewLight {
    /// Light state at the end of the view
    pub light: FrameLight,
    /// Range into [`ViewSnapshot::interactions`]
    pub interactions: std::ops::Range<usize>,
}

/// Everything the back end needs to draw one view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    /// Camera and culling state
    pub parms: ViewParms,
    /// Scene description the view was rendered from
    pub refdef: RefDef,
    /// Sorted draw surfaces
    pub draw_surfs: Vec<DrawSurf>,
    /// Interactions, grouped by light
    pub interactions: Vec<Interaction>,
    /// Lights with at least one interaction
    pub lights: Vec<ViewLight>,
}

/// One of the two command lists
#[derive(Debug, Clone)]
pub struct RenderCommandList {
    data: Vec<u8>,
    used: usize,
    full: bool,
    overflows: usize,
    views: Vec<ViewSnapshot>,
    poly_verts: Vec<PolyVert>,
    max_poly_verts: usize,
}

impl RenderCommandList {
    /// Bytes kept free for `SWAP_BUFFERS` and `END_OF_LIST`
    pub const RESERVED_TAIL: usize = CommandTag::SwapBuffers.command_size() + CommandTag::EndOfList.command_size();

    /// List of `capacity` bytes with room for `max_poly_verts` 2D vertices
    pub fn new(capacity: usize, max_poly_verts: usize) -> Self {
        Self {
            data: vec![0; capacity.max(Self::RESERVED_TAIL)],
            used: 0,
            full: false,
            overflows: 0,
            views: Vec::new(),
            poly_verts: Vec::new(),
            max_poly_verts,
        }
    }

    /// Total bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes written so far
    pub const fn used(&self) -> usize {
        self.used
    }

    /// `true` once a regular request was refused
    pub const fn is_full(&self) -> bool {
        self.full
    }

    /// Requests refused since the last reset
    pub const fn overflows(&self) -> usize {
        self.overflows
    }

    /// `true` when commands are waiting to be issued
    pub const fn has_pending(&self) -> bool {
        self.used > 0
    }

    fn allocate(&mut self, bytes: usize, use_tail: bool) -> RenderResult<Option<&mut [u8]>> {
        let capacity = self.data.len();
        if bytes + Self::RESERVED_TAIL > capacity {
            return Err(RenderError::CommandTooLarge { requested: bytes, capacity });
        }

        let limit = if use_tail {
            capacity - CommandTag::EndOfList.command_size()
        } else {
            if self.full {
                self.overflows += 1;
                return Ok(None);
            }
            capacity - Self::RESERVED_TAIL
        };

        if self.used + bytes > limit {
            if !use_tail {
                self.full = true;
            }
            self.overflows += 1;
            return Ok(None);
        }

        let start = self.used;
        self.used += bytes;
        Ok(self.data.get_mut(start..start + bytes))
    }

    /// Reserve `bytes` for a regular command.
    ///
    /// `Ok(None)` means the command was dropped because the list is full.
    pub fn get_command_buffer(&mut self, bytes: usize) -> RenderResult<Option<&mut [u8]>> {
        self.allocate(bytes, false)
    }

    fn write_tagged(&mut self, tag: CommandTag, payload: &[u8], use_tail: bool) -> RenderResult<bool> {
        let Some(slot) = self.allocate(TAG_SIZE + payload.len(), use_tail)? else {
            return Ok(false);
        };
        slot[..TAG_SIZE].copy_from_slice(&(tag as u32).to_ne_bytes());
        slot[TAG_SIZE..].copy_from_slice(payload);
        Ok(true)
    }

    /// Append a command with a payload; `Ok(false)` when dropped
    pub fn push<T: CommandPayload>(&mut self, payload: &T) -> RenderResult<bool> {
        self.write_tagged(T::TAG, bytemuck::bytes_of(payload), false)
    }

    /// Append `FINISH`
    pub fn push_finish(&mut self) -> RenderResult<bool> {
        self.write_tagged(CommandTag::Finish, &[], false)
    }

    /// Append `SWAP_BUFFERS`, which may use the reserved tail
    pub fn push_swap_buffers(&mut self) -> RenderResult<bool> {
        self.write_tagged(CommandTag::SwapBuffers, &[], true)
    }

    /// Append `DRAW_VIEW` and keep the snapshot with the list
    pub fn push_view(&mut self, snapshot: ViewSnapshot) -> RenderResult<bool> {
        let command = DrawViewCommand { view: self.views.len() as u32 };
        if !self.push(&command)? {
            return Ok(false);
        }
        self.views.push(snapshot);
        Ok(true)
    }

    /// Size of the 2D vertex arena
    pub const fn max_poly_verts(&self) -> usize {
        self.max_poly_verts
    }

    /// 2D vertices still available
    pub fn poly_verts_remaining(&self) -> usize {
        self.max_poly_verts.saturating_sub(self.poly_verts.len())
    }

    /// Append `2DPOLYS`, copying the vertices into the list's arena.
    ///
    /// `Ok(false)` when the command or the vertices do not fit.
    pub fn push_2d_polys(&mut self, shader: ShaderHandle, verts: &[PolyVert]) -> RenderResult<bool> {
        if verts.len() > self.poly_verts_remaining() {
            return Ok(false);
        }
        let command = TwoDPolysCommand {
            shader: shader.into(),
            first_vertex: self.poly_verts.len() as u32,
            num_vertices: verts.len() as u32,
        };
        if !self.push(&command)? {
            return Ok(false);
        }
        self.poly_verts.extend_from_slice(verts);
        Ok(true)
    }

    /// Write `END_OF_LIST` at the cursor without advancing it
    pub fn terminate(&mut self) {
        let at = self.used;
        if let Some(slot) = self.data.get_mut(at..at + TAG_SIZE) {
            slot.copy_from_slice(&(CommandTag::EndOfList as u32).to_ne_bytes());
        }
    }

    /// Rewind for reuse
    pub fn reset(&mut self) {
        self.used = 0;
        self.full = false;
        self.overflows = 0;
        self.views.clear();
        self.poly_verts.clear();
    }

    /// Written bytes plus the terminator
    pub fn bytes(&self) -> &[u8] {
        let end = (self.used + TAG_SIZE).min(self.data.len());
        &self.data[..end]
    }

    /// View snapshot referenced by a `DRAW_VIEW`
    pub fn view(&self, index: u32) -> Option<&ViewSnapshot> {
        self.views.get(index as usize)
    }

    /// Vertices referenced by a `2DPOLYS`
    pub fn poly_verts(&self, first: u32, count: u32) -> &[PolyVert] {
        let start = (first as usize).min(self.poly_verts.len());
        let end = (start + count as usize).min(self.poly_verts.len());
        &self.poly_verts[start..end]
    }

    /// Decode the terminated list in order
    pub fn commands(&self) -> CommandIter<'_> {
        CommandIter { bytes: self.bytes(), offset: 0, done: false }
    }
}

/// Iterator over the commands of a terminated list.
///
/// Stops at `END_OF_LIST` or after the first decoding error.
#[derive(Debug)]
pub struct CommandIter<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl Iterator for CommandIter<'_> {
    type Item = RenderResult<RenderCommand>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match decode_command(self.bytes, self.offset) {
            Ok((RenderCommand::EndOfList, _)) => {
                self.done = true;
                None
            }
            Ok((command, next)) => {
                self.offset = next;
                Some(Ok(command))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::commands::{SetColorCommand, StretchPicCommand};

    const SET_COLOR_SIZE: usize = CommandTag::SetColor.command_size();

    #[test]
    fn test_used_never_exceeds_capacity_minus_tail() {
        let mut list = RenderCommandList::new(128, 0);
        let limit = list.capacity() - RenderCommandList::RESERVED_TAIL;
        for _ in 0..32 {
            let _ = list.push(&SetColorCommand::default()).unwrap();
            assert!(list.used() <= limit);
        }
        assert!(list.is_full());
        assert_eq!(list.used() / SET_COLOR_SIZE, limit / SET_COLOR_SIZE);
    }

    #[test]
    fn test_fullness_is_monotonic_until_reset() {
        let mut list = RenderCommandList::new(2 * SET_COLOR_SIZE + RenderCommandList::RESERVED_TAIL + 4, 0);
        assert!(list.push(&SetColorCommand::default()).unwrap());
        // A large request fails and latches the list...
        assert!(!list.push(&StretchPicCommand::default()).unwrap());
        // ...so a request that would still fit is refused as well.
        assert!(list.get_command_buffer(4).unwrap().is_none());
        assert_eq!(list.overflows(), 2);

        // The frame can still be closed.
        assert!(list.push_swap_buffers().unwrap());

        list.reset();
        assert!(!list.is_full());
        assert!(list.get_command_buffer(4).unwrap().is_some());
    }

    #[test]
    fn test_oversized_request_is_an_error() {
        let mut list = RenderCommandList::new(64, 0);
        assert!(matches!(
            list.get_command_buffer(64),
            Err(RenderError::CommandTooLarge { requested: 64, capacity: 64 })
        ));
    }

    #[test]
    fn test_commands_decode_in_order() {
        let mut list = RenderCommandList::new(1024, 16);
        list.push(&SetColorCommand { color: [1.0, 0.0, 0.0, 1.0] }).unwrap();
        list.push_2d_polys(ShaderHandle::default(), &[PolyVert::default(); 3]).unwrap();
        list.push_finish().unwrap();
        list.push_swap_buffers().unwrap();
        list.terminate();

        let tags: Vec<CommandTag> = list.commands().map(|c| c.unwrap().tag()).collect();
        assert_eq!(tags, vec![CommandTag::SetColor, CommandTag::TwoDPolys, CommandTag::Finish, CommandTag::SwapBuffers]);
        assert_eq!(list.poly_verts(0, 3).len(), 3);
        assert_eq!(list.poly_verts_remaining(), 13);
    }

    #[test]
    fn test_2d_vertex_arena_exhaustion_drops_command() {
        let mut list = RenderCommandList::new(1024, 4);
        assert!(list.push_2d_polys(ShaderHandle::default(), &[PolyVert::default(); 3]).unwrap());
        assert!(!list.push_2d_polys(ShaderHandle::default(), &[PolyVert::default(); 3]).unwrap());
        assert_eq!(list.used(), CommandTag::TwoDPolys.command_size());
    }

    #[test]
    fn test_reader_stops_at_terminator_after_reset() {
        let mut list = RenderCommandList::new(256, 0);
        list.push(&SetColorCommand::default()).unwrap();
        list.reset();
        list.terminate();
        assert_eq!(list.commands().count(), 0);
    }
}
