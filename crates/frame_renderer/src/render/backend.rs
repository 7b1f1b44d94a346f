//! # Back End
//!
//! The back end drains a terminated command list in write order. Only the
//! command protocol lives here; what a back end does with each command (GPU
//! calls, capture, nothing) is up to the [`BackEnd`] implementation.
//!
//! Two drivers hand lists over:
//!
//! - [`BackEndDriver::Inline`] runs the back end on the caller's thread
//! - [`BackEndDriver::Threaded`] moves the back end to a worker thread; lists
//!   travel over channels and at most one is in flight

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::foundation::logging::{debug, error};
use crate::render::command_buffer::{RenderCommandList, ViewSnapshot};
use crate::render::commands::{
    DrawBufferCommand, PolyVert, RenderCommand, RenderToTextureCommand, RotatedPicCommand, SetColorCommand,
    StretchPicCommand, StretchPicGradientCommand, TwoDPolysCommand, VideoFrameCommand,
};
use crate::render::{RenderError, RenderResult};

/// Consumer of render commands, one method per tag.
///
/// Every method defaults to doing nothing so a back end only implements
/// what it cares about.
pub trait BackEnd: Send {
    /// `SET_COLOR`
    fn set_color(&mut self, _cmd: &SetColorCommand) {}

    /// `STRETCH_PIC`
    fn stretch_pic(&mut self, _cmd: &StretchPicCommand) {}

    /// `2DPOLYS` with its vertices
    fn two_d_polys(&mut self, _cmd: &TwoDPolysCommand, _verts: &[PolyVert]) {}

    /// `ROTATED_PIC`
    fn rotated_pic(&mut self, _cmd: &RotatedPicCommand) {}

    /// `STRETCH_PIC_GRADIENT`
    fn stretch_pic_gradient(&mut self, _cmd: &StretchPicGradientCommand) {}

    /// `DRAW_VIEW` with the snapshot it references
    fn draw_view(&mut self, _view: &ViewSnapshot) {}

    /// `DRAW_BUFFER`
    fn draw_buffer(&mut self, _cmd: &DrawBufferCommand) {}

    /// `SWAP_BUFFERS`
    fn swap_buffers(&mut self) {}

    /// `VIDEOFRAME`
    fn video_frame(&mut self, _cmd: &VideoFrameCommand) {}

    /// `RENDERTOTEXTURE`
    fn render_to_texture(&mut self, _cmd: &RenderToTextureCommand) {}

    /// `FINISH`
    fn finish(&mut self) {}
}

/// Decode a terminated list and dispatch each command in order.
///
/// Stops at the first decoding error; commands before it have already run.
pub fn execute_render_commands(list: &RenderCommandList, backend: &mut dyn BackEnd) -> RenderResult<()> {
    for command in list.commands() {
        match command? {
            RenderCommand::EndOfList => break,
            RenderCommand::SetColor(cmd) => backend.set_color(&cmd),
            RenderCommand::StretchPic(cmd) => backend.stretch_pic(&cmd),
            RenderCommand::TwoDPolys(cmd) => {
                backend.two_d_polys(&cmd, list.poly_verts(cmd.first_vertex, cmd.num_vertices));
            }
            RenderCommand::RotatedPic(cmd) => backend.rotated_pic(&cmd),
            RenderCommand::StretchPicGradient(cmd) => backend.stretch_pic_gradient(&cmd),
            RenderCommand::DrawView(cmd) => match list.view(cmd.view) {
                Some(view) => backend.draw_view(view),
                None => debug!("DRAW_VIEW references missing view {}", cmd.view),
            },
            RenderCommand::DrawBuffer(cmd) => backend.draw_buffer(&cmd),
            RenderCommand::SwapBuffers => backend.swap_buffers(),
            RenderCommand::VideoFrame(cmd) => backend.video_frame(&cmd),
            RenderCommand::RenderToTexture(cmd) => backend.render_to_texture(&cmd),
            RenderCommand::Finish => backend.finish(),
        }
    }
    Ok(())
}

/// A command as seen by [`RecordingBackEnd`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// Any command without attached data
    Command(RenderCommand),
    /// `2DPOLYS` with a copy of its vertices
    Polys(TwoDPolysCommand, Vec<PolyVert>),
    /// `DRAW_VIEW` with a copy of its snapshot
    View(Box<ViewSnapshot>),
}

/// Back end that records every command into a shared log
#[derive(Debug, Clone, Default)]
pub struct RecordingBackEnd {
    log: Arc<Mutex<Vec<RecordedCommand>>>,
}

impl RecordingBackEnd {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the log, usable after the recorder moved to a driver
    pub fn log(&self) -> Arc<Mutex<Vec<RecordedCommand>>> {
        Arc::clone(&self.log)
    }

    /// Copy of everything recorded so far
    pub fn recorded(&self) -> Vec<RecordedCommand> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn record(&self, command: RecordedCommand) {
        if let Ok(mut log) = self.log.lock() {
            log.push(command);
        }
    }
}

impl BackEnd for RecordingBackEnd {
    fn set_color(&mut self, cmd: &SetColorCommand) {
        self.record(RecordedCommand::Command(RenderCommand::SetColor(*cmd)));
    }

    fn stretch_pic(&mut self, cmd: &StretchPicCommand) {
        self.record(RecordedCommand::Command(RenderCommand::StretchPic(*cmd)));
    }

    fn two_d_polys(&mut self, cmd: &TwoDPolysCommand, verts: &[PolyVert]) {
        self.record(RecordedCommand::Polys(*cmd, verts.to_vec()));
    }

    fn rotated_pic(&mut self, cmd: &RotatedPicCommand) {
        self.record(RecordedCommand::Command(RenderCommand::RotatedPic(*cmd)));
    }

    fn stretch_pic_gradient(&mut self, cmd: &StretchPicGradientCommand) {
        self.record(RecordedCommand::Command(RenderCommand::StretchPicGradient(*cmd)));
    }

    fn draw_view(&mut self, view: &ViewSnapshot) {
        self.record(RecordedCommand::View(Box::new(view.clone())));
    }

    fn draw_buffer(&mut self, cmd: &DrawBufferCommand) {
        self.record(RecordedCommand::Command(RenderCommand::DrawBuffer(*cmd)));
    }

    fn swap_buffers(&mut self) {
        self.record(RecordedCommand::Command(RenderCommand::SwapBuffers));
    }

    fn video_frame(&mut self, cmd: &VideoFrameCommand) {
        self.record(RecordedCommand::Command(RenderCommand::VideoFrame(*cmd)));
    }

    fn render_to_texture(&mut self, cmd: &RenderToTextureCommand) {
        self.record(RecordedCommand::Command(RenderCommand::RenderToTexture(*cmd)));
    }

    fn finish(&mut self) {
        self.record(RecordedCommand::Command(RenderCommand::Finish));
    }
}

/// What the worker sends back after executing a list
type WorkerReply = (RenderCommandList, RenderResult<()>, Duration);

/// Back end running on its own thread
pub struct ThreadedBackEnd {
    submit: Option<Sender<RenderCommandList>>,
    reply: Receiver<WorkerReply>,
    worker: Option<JoinHandle<()>>,
    in_flight: bool,
}

impl ThreadedBackEnd {
    /// Move `backend` to a new worker thread
    pub fn spawn(mut backend: Box<dyn BackEnd>) -> RenderResult<Self> {
        let (submit, jobs) = mpsc::channel::<RenderCommandList>();
        let (done, reply) = mpsc::channel::<WorkerReply>();

        let worker = std::thread::Builder::new()
            .name("render-backend".to_string())
            .spawn(move || {
                for list in jobs {
                    let start = Instant::now();
                    let result = execute_render_commands(&list, backend.as_mut());
                    if done.send((list, result, start.elapsed())).is_err() {
                        break;
                    }
                }
                debug!("Render back end thread exiting");
            })
            .map_err(|_| RenderError::BackEndDisconnected)?;

        Ok(Self {
            submit: Some(submit),
            reply,
            worker: Some(worker),
            in_flight: false,
        })
    }

    /// `true` while the worker holds a list
    pub const fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Hand a list to the worker; the caller must have waited for the previous one
    pub fn submit(&mut self, list: RenderCommandList) -> RenderResult<()> {
        let sender = self.submit.as_ref().ok_or(RenderError::BackEndDisconnected)?;
        sender.send(list).map_err(|_| RenderError::BackEndDisconnected)?;
        self.in_flight = true;
        Ok(())
    }

    /// Block until the worker returns the list it holds
    pub fn wait(&mut self) -> RenderResult<Option<(RenderCommandList, RenderResult<()>, Duration)>> {
        if !self.in_flight {
            return Ok(None);
        }
        let reply = self.reply.recv().map_err(|_| RenderError::BackEndDisconnected)?;
        self.in_flight = false;
        Ok(Some(reply))
    }
}

impl std::fmt::Debug for ThreadedBackEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedBackEnd").field("in_flight", &self.in_flight).finish()
    }
}

impl Drop for ThreadedBackEnd {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.submit = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Render back end thread panicked");
            }
        }
    }
}

/// Where issued command lists are executed
pub enum BackEndDriver {
    /// On the caller's thread
    Inline(Box<dyn BackEnd>),
    /// On a worker thread
    Threaded(ThreadedBackEnd),
}

impl std::fmt::Debug for BackEndDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline"),
            Self::Threaded(threaded) => threaded.fmt(f),
        }
    }
}

impl BackEndDriver {
    /// Worker-thread driver around `backend`
    pub fn threaded(backend: Box<dyn BackEnd>) -> RenderResult<Self> {
        ThreadedBackEnd::spawn(backend).map(Self::Threaded)
    }
}

/// Outcome of one executed list
#[derive(Debug)]
pub struct BackEndReport {
    /// `false` when the list stopped at a decoding error
    pub succeeded: bool,
    /// Time spent executing
    pub elapsed: Duration,
}

/// The two command lists and the driver that drains them.
///
/// The front end always writes into [`current`](Self::current). Issuing
/// terminates it and hands it to the driver; the other list becomes current
/// once the driver gives it back.
#[derive(Debug)]
pub struct CommandQueue {
    current: RenderCommandList,
    idle: Option<RenderCommandList>,
    driver: BackEndDriver,
    last_report: Option<BackEndReport>,
}

impl CommandQueue {
    /// Queue with two lists of `capacity` bytes each
    pub fn new(capacity: usize, max_poly_verts: usize, driver: BackEndDriver) -> Self {
        Self {
            current: RenderCommandList::new(capacity, max_poly_verts),
            idle: Some(RenderCommandList::new(capacity, max_poly_verts)),
            driver,
            last_report: None,
        }
    }

    /// List the front end writes into
    pub fn current(&mut self) -> &mut RenderCommandList {
        &mut self.current
    }

    /// Read-only view of the current list
    pub fn current_ref(&self) -> &RenderCommandList {
        &self.current
    }

    /// Result of the most recently completed list
    pub fn last_report(&self) -> Option<&BackEndReport> {
        self.last_report.as_ref()
    }

    /// Terminate the current list and execute it.
    ///
    /// With `skip_back_end` the list is terminated and rewound without being
    /// executed. Inline execution errors are returned directly; threaded
    /// errors surface from the next [`wait`](Self::wait).
    pub fn issue(&mut self, skip_back_end: bool) -> RenderResult<()> {
        self.current.terminate();
        if skip_back_end {
            self.current.reset();
            return Ok(());
        }

        if let BackEndDriver::Inline(backend) = &mut self.driver {
            let start = Instant::now();
            let result = execute_render_commands(&self.current, backend.as_mut());
            self.current.reset();
            self.last_report = Some(BackEndReport { succeeded: result.is_ok(), elapsed: start.elapsed() });
            return result;
        }

        // One list in flight at a time.
        self.wait()?;
        let replacement = match self.idle.take() {
            Some(list) => list,
            None => RenderCommandList::new(self.current.capacity(), self.current.max_poly_verts()),
        };
        let outgoing = std::mem::replace(&mut self.current, replacement);
        if let BackEndDriver::Threaded(threaded) = &mut self.driver {
            threaded.submit(outgoing)?;
        }
        Ok(())
    }

    /// Block until the back end holds no list, then surface its result
    pub fn wait(&mut self) -> RenderResult<()> {
        let BackEndDriver::Threaded(threaded) = &mut self.driver else {
            return Ok(());
        };
        if let Some((mut list, result, elapsed)) = threaded.wait()? {
            list.reset();
            self.idle = Some(list);
            self.last_report = Some(BackEndReport { succeeded: result.is_ok(), elapsed });
            return result;
        }
        Ok(())
    }

    /// Flush the current list if it holds commands
    pub fn issue_pending(&mut self, skip_back_end: bool) -> RenderResult<()> {
        if self.current.has_pending() {
            self.issue(skip_back_end)?;
        }
        self.wait()
    }

    /// Switch the front end to the other list for the next frame
    pub fn swap(&mut self) {
        if let Some(mut next) = self.idle.take() {
            next.reset();
            let previous = std::mem::replace(&mut self.current, next);
            self.idle = Some(previous);
        }
        self.current.reset();
    }
}
