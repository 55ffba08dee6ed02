//! FFmpeg decoder process supervision
//!
//! One decoder subprocess per camera. stdout carries back-to-back raw BGR24
//! frames of exactly width*height*3 bytes; stderr is drained by a dedicated
//! thread so the pipe can never fill up and stall the decoder.

use crate::config::StreamConfig;
use crate::error::{StreamError, StreamResult};
use log::{debug, info, warn};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const TERMINATE_TIMEOUT: Duration = Duration::from_secs(2);
const RESTART_GAP: Duration = Duration::from_millis(200);

/// Supervises a single FFmpeg decoder subprocess
///
/// The owning processor holds the only handle; pipes and the stderr drain
/// worker are closed and joined on every terminate so nothing leaks across
/// restarts.
pub struct DecoderSupervisor {
    camera_id: String,
    rtsp_url: String,
    config: StreamConfig,
    child: Option<Child>,
    stderr_thread: Option<thread::JoinHandle<()>>,
}

impl DecoderSupervisor {
    pub fn new(camera_id: &str, rtsp_url: &str, config: StreamConfig) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            rtsp_url: rtsp_url.to_string(),
            config,
            child: None,
            stderr_thread: None,
        }
    }

    /// Spawn the decoder and hand its stdout pipe to the caller
    pub fn start(&mut self) -> StreamResult<ChildStdout> {
        let args = build_decoder_args(&self.rtsp_url, &self.config);
        debug!("[{}] launching ffmpeg {}", self.camera_id, args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StreamError::DecoderStartFailed(format!("spawn ffmpeg: {}", e)))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            StreamError::DecoderStartFailed("ffmpeg stdout not captured".to_string())
        })?;

        if let Some(stderr) = child.stderr.take() {
            let camera_id = self.camera_id.clone();
            self.stderr_thread = Some(thread::spawn(move || drain_stderr(&camera_id, stderr)));
        }

        self.child = Some(child);
        info!("[{}] decoder pipeline started: {}", self.camera_id, self.rtsp_url);
        Ok(stdout)
    }

    /// Whether a decoder subprocess is currently alive under supervision
    pub fn is_started(&self) -> bool {
        self.child.is_some()
    }

    /// Terminate the decoder: graceful signal, 2 s wait, then a hard kill
    ///
    /// Always reaps the child and joins the stderr drain so restarts never
    /// leak handles. Safe to call when nothing is running.
    pub fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            request_exit(&mut child);

            let deadline = Instant::now() + TERMINATE_TIMEOUT;
            let mut exited = false;
            while Instant::now() < deadline {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!("[{}] decoder exited: {}", self.camera_id, status);
                        exited = true;
                        break;
                    }
                    Ok(None) => thread::sleep(Duration::from_millis(50)),
                    Err(e) => {
                        warn!("[{}] wait on decoder failed: {}", self.camera_id, e);
                        break;
                    }
                }
            }

            if !exited {
                warn!("[{}] decoder did not exit in time, killing", self.camera_id);
                let _ = child.kill();
                let _ = child.wait();
            }
        }

        // 子进程退出后 stderr 管道关闭，排水线程随即结束
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }

    /// Terminate and start again after a short gap
    pub fn restart(&mut self) -> StreamResult<ChildStdout> {
        info!("[{}] restarting decoder", self.camera_id);
        self.terminate();
        thread::sleep(RESTART_GAP);
        self.start()
    }
}

impl Drop for DecoderSupervisor {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(unix)]
fn request_exit(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).is_err() {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn request_exit(child: &mut Child) {
    let _ = child.kill();
}

fn drain_stderr(camera_id: &str, stderr: ChildStderr) {
    let reader = BufReader::new(stderr);
    for line in reader.lines() {
        match line {
            Ok(line) => debug!("[ffmpeg:{}] {}", camera_id, line.trim_end()),
            Err(_) => break,
        }
    }
}

/// Fixed ffmpeg argument template
///
/// TCP RTSP transport, low-latency flags, dropped packets on overflow, forced
/// output resolution, raw BGR24 on stdout. The hardware acceleration prefix is
/// platform-selected and best-effort only: a failed accelerated start surfaces
/// as a fatal processor error, it is never retried in software.
pub fn build_decoder_args(rtsp_url: &str, config: &StreamConfig) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();

    for arg in hwaccel_args() {
        args.push((*arg).to_string());
    }

    for arg in [
        "-rtsp_transport",
        "tcp",
        "-max_delay",
        "500000",
        "-reorder_queue_size",
        "0",
        "-fflags",
        "nobuffer+fastseek+flush_packets",
        "-flags",
        "low_delay",
        "-i",
    ] {
        args.push(arg.to_string());
    }
    args.push(rtsp_url.to_string());

    for arg in ["-f", "rawvideo", "-pix_fmt", "bgr24", "-s"] {
        args.push(arg.to_string());
    }
    args.push(format!("{}x{}", config.width, config.height));

    args.push("-vsync".to_string());
    args.push("drop".to_string());
    args.push("-".to_string());

    args
}

fn hwaccel_args() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &["-hwaccel", "d3d11va", "-hwaccel_output_format", "d3d11"]
    } else {
        &[]
    }
}

/// Read until `buf` is full or the pipe delivers no more bytes
///
/// Returns the number of bytes actually read; anything short of a full frame
/// is stream corruption or EOF and counts as an empty read for the caller.
pub fn read_frame_exact<R: Read>(pipe: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match pipe.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_decoder_args_template() {
        let config = StreamConfig::default();
        let args = build_decoder_args("rtsp://10.0.0.5:554/live", &config);

        let tcp_pos = args.iter().position(|a| a == "-rtsp_transport").unwrap();
        assert_eq!(args[tcp_pos + 1], "tcp");

        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input_pos + 1], "rtsp://10.0.0.5:554/live");

        let size_pos = args.iter().position(|a| a == "-s").unwrap();
        assert_eq!(args[size_pos + 1], "960x540");

        assert!(args.contains(&"bgr24".to_string()));
        assert!(args.contains(&"low_delay".to_string()));
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    #[cfg(not(target_os = "windows"))]
    fn test_no_hwaccel_prefix_off_windows() {
        let args = build_decoder_args("rtsp://host/live", &StreamConfig::default());
        assert_eq!(args[0], "-rtsp_transport");
        assert!(!args.contains(&"-hwaccel".to_string()));
    }

    #[test]
    fn test_read_frame_exact_full() {
        let data = vec![7u8; 32];
        let mut cursor = Cursor::new(data);
        let mut buf = [0u8; 32];
        assert_eq!(read_frame_exact(&mut cursor, &mut buf).unwrap(), 32);
        assert!(buf.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_read_frame_exact_short() {
        let mut cursor = Cursor::new(vec![1u8; 10]);
        let mut buf = [0u8; 32];
        assert_eq!(read_frame_exact(&mut cursor, &mut buf).unwrap(), 10);
    }

    #[test]
    fn test_read_frame_exact_empty() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let mut buf = [0u8; 32];
        assert_eq!(read_frame_exact(&mut cursor, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_terminate_without_start_is_noop() {
        let mut supervisor =
            DecoderSupervisor::new("cam", "rtsp://host/live", StreamConfig::default());
        assert!(!supervisor.is_started());
        supervisor.terminate();
        supervisor.terminate();
    }
}
