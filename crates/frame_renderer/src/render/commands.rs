//! Render command encoding
//!
//! A command is a `u32` tag followed by a fixed-layout payload. The tag
//! alone decides the payload size, so a reader never needs a length field.
//! Payloads are plain `#[repr(C)]` structs that are copied byte for byte
//! with `bytemuck`.

use bytemuck::{Pod, Zeroable};

use crate::foundation::collections::{key_from_bits, key_to_bits};
use crate::render::shader::ShaderHandle;
use crate::render::{RenderError, RenderResult};

/// Size of a command tag in bytes
pub const TAG_SIZE: usize = std::mem::size_of::<u32>();

/// Closed set of command kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandTag {
    /// Terminates a command list
    EndOfList = 0,
    /// Set the 2D drawing color
    SetColor = 1,
    /// Axis-aligned 2D picture
    StretchPic = 2,
    /// 2D polygons from the list's vertex arena
    TwoDPolys = 3,
    /// Rotated 2D picture
    RotatedPic = 4,
    /// 2D picture with a color gradient
    StretchPicGradient = 5,
    /// Render one view
    DrawView = 6,
    /// Select the draw buffer
    DrawBuffer = 7,
    /// Present the frame
    SwapBuffers = 8,
    /// Capture the frame for video
    VideoFrame = 9,
    /// Copy a screen region into a texture
    RenderToTexture = 10,
    /// Wait for the GPU
    Finish = 11,
}

impl CommandTag {
    /// Every tag, in numeric order
    pub const ALL: [Self; 12] = [
        Self::EndOfList,
        Self::SetColor,
        Self::StretchPic,
        Self::TwoDPolys,
        Self::RotatedPic,
        Self::StretchPicGradient,
        Self::DrawView,
        Self::DrawBuffer,
        Self::SwapBuffers,
        Self::VideoFrame,
        Self::RenderToTexture,
        Self::Finish,
    ];

    /// Tag for a raw value
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Bytes following the tag
    pub const fn payload_size(self) -> usize {
        match self {
            Self::EndOfList | Self::SwapBuffers | Self::Finish => 0,
            Self::SetColor => std::mem::size_of::<SetColorCommand>(),
            Self::StretchPic => std::mem::size_of::<StretchPicCommand>(),
            Self::TwoDPolys => std::mem::size_of::<TwoDPolysCommand>(),
            Self::RotatedPic => std::mem::size_of::<RotatedPicCommand>(),
            Self::StretchPicGradient => std::mem::size_of::<StretchPicGradientCommand>(),
            Self::DrawView => std::mem::size_of::<DrawViewCommand>(),
            Self::DrawBuffer => std::mem::size_of::<DrawBufferCommand>(),
            Self::VideoFrame => std::mem::size_of::<VideoFrameCommand>(),
            Self::RenderToTexture => std::mem::size_of::<RenderToTextureCommand>(),
        }
    }

    /// Tag plus payload
    pub const fn command_size(self) -> usize {
        TAG_SIZE + self.payload_size()
    }
}

/// A shader handle split into two words so payloads stay 4-byte aligned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(C)]
pub struct HandleBits {
    /// Low word
    pub lo: u32,
    /// High word
    pub hi: u32,
}

impl From<ShaderHandle> for HandleBits {
    fn from(handle: ShaderHandle) -> Self {
        let bits = key_to_bits(handle);
        Self { lo: bits as u32, hi: (bits >> 32) as u32 }
    }
}

impl HandleBits {
    /// Shader handle these bits were made from
    pub fn shader(self) -> ShaderHandle {
        key_from_bits((u64::from(self.hi) << 32) | u64::from(self.lo))
    }
}

/// Payload types and the tag that announces them
pub trait CommandPayload: Pod {
    /// Tag written before the payload
    const TAG: CommandTag;
}

/// `SET_COLOR`
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct SetColorCommand {
    /// RGBA in 0..=1
    pub color: [f32; 4],
}

/// `STRETCH_PIC`
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct StretchPicCommand {
    /// Material
    pub shader: HandleBits,
    /// Left
    pub x: f32,
    /// Top
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

/// `ROTATED_PIC`
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct RotatedPicCommand {
    /// Picture placement and texture window
    pub pic: StretchPicCommand,
    /// Rotation in degrees
    pub angle: f32,
}

/// `STRETCH_PIC_GRADIENT`
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct StretchPicGradientCommand {
    /// Picture placement and texture window
    pub pic: StretchPicCommand,
    /// Color at the far end of the gradient
    pub gradient_color: [f32; 4],
    /// Gradient direction selector
    pub gradient_type: u32,
}

/// `2DPOLYS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct TwoDPolysCommand {
    /// Material
    pub shader: HandleBits,
    /// First vertex in the list's 2D vertex arena
    pub first_vertex: u32,
    /// Vertex count
    pub num_vertices: u32,
}

/// `DRAW_VIEW`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DrawViewCommand {
    /// Index of the view snapshot stored with the list
    pub view: u32,
}

/// `DRAW_BUFFER`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DrawBufferCommand {
    /// `0` back buffer, `1` front buffer
    pub buffer: u32,
}

/// `VIDEOFRAME`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct VideoFrameCommand {
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Non-zero to encode the capture
    pub encode: u32,
}

/// `RENDERTOTEXTURE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct RenderToTextureCommand {
    /// Target texture slot
    pub texture: u32,
    /// Source left
    pub x: i32,
    /// Source bottom
    pub y: i32,
    /// Source width
    pub width: i32,
    /// Source height
    pub height: i32,
}

/// Vertex of a scene or 2D polygon
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct PolyVert {
    /// Position
    pub xyz: [f32; 3],
    /// Texture coordinates
    pub st: [f32; 2],
    /// Color
    pub modulate: [u8; 4],
}

impl CommandPayload for SetColorCommand {
    const TAG: CommandTag = CommandTag::SetColor;
}
impl CommandPayload for StretchPicCommand {
    const TAG: CommandTag = CommandTag::StretchPic;
}
impl CommandPayload for RotatedPicCommand {
    const TAG: CommandTag = CommandTag::RotatedPic;
}
impl CommandPayload for StretchPicGradientCommand {
    const TAG: CommandTag = CommandTag::StretchPicGradient;
}
impl CommandPayload for TwoDPolysCommand {
    const TAG: CommandTag = CommandTag::TwoDPolys;
}
impl CommandPayload for DrawViewCommand {
    const TAG: CommandTag = CommandTag::DrawView;
}
impl CommandPayload for DrawBufferCommand {
    const TAG: CommandTag = CommandTag::DrawBuffer;
}
impl CommandPayload for VideoFrameCommand {
    const TAG: CommandTag = CommandTag::VideoFrame;
}
impl CommandPayload for RenderToTextureCommand {
    const TAG: CommandTag = CommandTag::RenderToTexture;
}

/// A decoded command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderCommand {
    /// End of the list
    EndOfList,
    /// 2D color
    SetColor(SetColorCommand),
    /// 2D picture
    StretchPic(StretchPicCommand),
    /// 2D polygons
    TwoDPolys(TwoDPolysCommand),
    /// Rotated 2D picture
    RotatedPic(RotatedPicCommand),
    /// Gradient 2D picture
    StretchPicGradient(StretchPicGradientCommand),
    /// 3D view
    DrawView(DrawViewCommand),
    /// Draw buffer selection
    DrawBuffer(DrawBufferCommand),
    /// Present
    SwapBuffers,
    /// Video capture
    VideoFrame(VideoFrameCommand),
    /// Screen-to-texture copy
    RenderToTexture(RenderToTextureCommand),
    /// GPU sync
    Finish,
}

impl RenderCommand {
    /// Tag of the command
    pub const fn tag(&self) -> CommandTag {
        match self {
            Self::EndOfList => CommandTag::EndOfList,
            Self::SetColor(_) => CommandTag::SetColor,
            Self::StretchPic(_) => CommandTag::StretchPic,
            Self::TwoDPolys(_) => CommandTag::TwoDPolys,
            Self::RotatedPic(_) => CommandTag::RotatedPic,
            Self::StretchPicGradient(_) => CommandTag::StretchPicGradient,
            Self::DrawView(_) => CommandTag::DrawView,
            Self::DrawBuffer(_) => CommandTag::DrawBuffer,
            Self::SwapBuffers => CommandTag::SwapBuffers,
            Self::VideoFrame(_) => CommandTag::VideoFrame,
            Self::RenderToTexture(_) => CommandTag::RenderToTexture,
            Self::Finish => CommandTag::Finish,
        }
    }
}

fn read_payload<T: Pod>(bytes: &[u8], offset: usize) -> RenderResult<T> {
    let size = std::mem::size_of::<T>();
    bytes
        .get(offset..offset + size)
        .map(bytemuck::pod_read_unaligned)
        .ok_or(RenderError::TruncatedCommand { offset })
}

/// Decode the command starting at `offset`.
///
/// Returns the command and the offset of the next one.
pub fn decode_command(bytes: &[u8], offset: usize) -> RenderResult<(RenderCommand, usize)> {
    let raw: u32 = read_payload(bytes, offset)?;
    let tag = CommandTag::from_u32(raw).ok_or(RenderError::UnknownCommandTag { tag: raw, offset })?;
    let at = offset + TAG_SIZE;

    let command = match tag {
        CommandTag::EndOfList => RenderCommand::EndOfList,
        CommandTag::SetColor => RenderCommand::SetColor(read_payload(bytes, at)?),
        CommandTag::StretchPic => RenderCommand::StretchPic(read_payload(bytes, at)?),
        CommandTag::TwoDPolys => RenderCommand::TwoDPolys(read_payload(bytes, at)?),
        CommandTag::RotatedPic => RenderCommand::RotatedPic(read_payload(bytes, at)?),
        CommandTag::StretchPicGradient => RenderCommand::StretchPicGradient(read_payload(bytes, at)?),
        CommandTag::DrawView => RenderCommand::DrawView(read_payload(bytes, at)?),
        CommandTag::DrawBuffer => RenderCommand::DrawBuffer(read_payload(bytes, at)?),
        CommandTag::SwapBuffers => RenderCommand::SwapBuffers,
        CommandTag::VideoFrame => RenderCommand::VideoFrame(read_payload(bytes, at)?),
        CommandTag::RenderToTexture => RenderCommand::RenderToTexture(read_payload(bytes, at)?),
        CommandTag::Finish => RenderCommand::Finish,
    };

    Ok((command, at + tag.payload_size()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip_through_u32() {
        for tag in CommandTag::ALL {
            assert_eq!(CommandTag::from_u32(tag as u32), Some(tag));
        }
        assert_eq!(CommandTag::from_u32(12), None);
    }

    #[test]
    fn test_payloads_have_no_padding() {
        assert_eq!(std::mem::size_of::<HandleBits>(), 8);
        assert_eq!(std::mem::size_of::<StretchPicCommand>(), 40);
        assert_eq!(std::mem::size_of::<RotatedPicCommand>(), 44);
        assert_eq!(std::mem::size_of::<StretchPicGradientCommand>(), 60);
        assert_eq!(std::mem::size_of::<PolyVert>(), 24);
    }

    #[test]
    fn test_decode_rejects_unknown_and_truncated() {
        let mut bytes = 99u32.to_ne_bytes().to_vec();
        assert!(matches!(
            decode_command(&bytes, 0),
            Err(RenderError::UnknownCommandTag { tag: 99, offset: 0 })
        ));

        bytes = (CommandTag::SetColor as u32).to_ne_bytes().to_vec();
        bytes.extend_from_slice(&[0; 8]);
        assert!(matches!(decode_command(&bytes, 0), Err(RenderError::TruncatedCommand { offset: 4 })));
    }

    #[test]
    fn test_decode_reads_payload_and_advances() {
        let mut bytes = (CommandTag::DrawBuffer as u32).to_ne_bytes().to_vec();
        bytes.extend_from_slice(bytemuck::bytes_of(&DrawBufferCommand { buffer: 1 }));
        bytes.extend_from_slice(&(CommandTag::EndOfList as u32).to_ne_bytes());

        let (cmd, next) = decode_command(&bytes, 0).unwrap();
        assert_eq!(cmd, RenderCommand::DrawBuffer(DrawBufferCommand { buffer: 1 }));
        assert_eq!(next, 8);
        assert_eq!(decode_command(&bytes, next).unwrap().0, RenderCommand::EndOfList);
    }

    #[test]
    fn test_handle_bits_roundtrip() {
        let mut registry = crate::render::shader::ShaderRegistry::new();
        let handle = registry.register(crate::render::shader::Shader::new("x"));
        assert_eq!(HandleBits::from(handle).shader(), handle);
    }
}
