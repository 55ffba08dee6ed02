//! 视频流处理器
//!
//! 每路摄像头一个处理器：FFmpeg 解码管道 + 专属读取线程 + 双槽帧缓存。
//! 读取线程从解码器 stdout 读取定长 BGR 帧，按自适应间隔跳帧，经增强
//! 管道处理后与原始帧一起原子地写入缓存。原始帧与增强帧永远来自同一
//! 个源帧。

use std::path::PathBuf;
use std::process::ChildStdout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rtsp_camera::{probe_rtsp_reachable, read_frame_exact, DecoderSupervisor, StreamConfig};
use tracing::{error, info, warn};
use video_enhance::{EnhanceParamsUpdate, FrameEnhancer, ParamStore};

use crate::types::Frame;

const SKIP_INTERVAL_INITIAL: u32 = 3;
const SKIP_INTERVAL_MIN: u32 = 2;
const SKIP_INTERVAL_MAX: u32 = 6;
const ENHANCE_SLOW_THRESHOLD: Duration = Duration::from_millis(60);
const ENHANCE_FAST_THRESHOLD: Duration = Duration::from_millis(30);
const PIPE_WAIT: Duration = Duration::from_millis(50);
const RESTART_BACKOFF: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_millis(100);
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 双槽帧缓存
///
/// 两个槽位在同一把锁下成对换入：读者要么看到旧的一对，要么看到新的
/// 一对，绝不会看到混搭。
#[derive(Default)]
struct FrameSlots {
    original: Option<Frame>,
    enhanced: Option<Frame>,
}

/// 单路摄像头的完整运行单元
///
/// 读取线程持有处理器的 Arc 克隆，所有共享状态都经由内部锁访问。
pub struct StreamProcessor {
    camera_id: String,
    rtsp_url: String,
    config: StreamConfig,
    running: AtomicBool,
    slots: Mutex<FrameSlots>,
    current_fps: Mutex<f64>,
    supervisor: Mutex<DecoderSupervisor>,
    params: Arc<ParamStore>,
    reader_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl StreamProcessor {
    /// 创建并启动处理器：探测 → 启动解码器 → 启动读取线程
    ///
    /// 探测失败或解码器启动失败时处理器保持 not-running 状态返回，
    /// 仍可被注册表保留用于状态查询，不会自动重试。
    pub fn start(
        camera_id: &str,
        rtsp_url: &str,
        lut_path: Option<PathBuf>,
        config: StreamConfig,
        params: Arc<ParamStore>,
    ) -> Arc<Self> {
        let processor = Arc::new(Self {
            camera_id: camera_id.to_string(),
            rtsp_url: rtsp_url.to_string(),
            supervisor: Mutex::new(DecoderSupervisor::new(camera_id, rtsp_url, config.clone())),
            config,
            running: AtomicBool::new(false),
            slots: Mutex::new(FrameSlots::default()),
            current_fps: Mutex::new(0.0),
            params,
            reader_thread: Mutex::new(None),
        });

        if !probe_rtsp_reachable(rtsp_url) {
            warn!("RTSP 流不可达，跳过摄像头 {}: {}", camera_id, rtsp_url);
            return processor;
        }

        let pipe = {
            let mut supervisor = processor.supervisor.lock().unwrap();
            match supervisor.start() {
                Ok(stdout) => Some(stdout),
                Err(e) => {
                    error!("[{}] 解码器启动失败: {}", camera_id, e);
                    return processor;
                }
            }
        };

        processor.running.store(true, Ordering::Relaxed);

        let worker = Arc::clone(&processor);
        let handle = thread::spawn(move || worker.reader_loop(pipe, lut_path));
        *processor.reader_thread.lock().unwrap() = Some(handle);

        info!("[{}] 视频流处理器启动完成", camera_id);
        processor
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn rtsp_url(&self) -> &str {
        &self.rtsp_url
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// 原始帧快照；尚无帧时返回 None
    pub fn original_frame(&self) -> Option<Frame> {
        self.slots.lock().unwrap().original.clone()
    }

    /// 增强帧快照；尚无帧时返回 None
    pub fn enhanced_frame(&self) -> Option<Frame> {
        self.slots.lock().unwrap().enhanced.clone()
    }

    /// 最近 1 秒窗口的 FPS
    pub fn fps(&self) -> f64 {
        *self.current_fps.lock().unwrap()
    }

    /// 参数更新钩子
    ///
    /// 当前全部路由到共享参数存储；钩子保留下来是为了将来支持按路
    /// 覆盖时不必改动调用方。
    pub fn update_params(&self, update: &EnhanceParamsUpdate) {
        self.params.update(update);
    }

    /// 停止处理器：置 running=false → 终止解码器 → 等待读取线程退出
    ///
    /// 幂等，可重复调用。
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.supervisor.lock().unwrap().terminate();

        if let Some(handle) = self.reader_thread.lock().unwrap().take() {
            let deadline = Instant::now() + STOP_JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(20));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!("[{}] 读取线程未在限时内退出", self.camera_id);
            }
        }

        info!("[{}] 视频流处理器已停止", self.camera_id);
    }

    /// 读取线程主循环：读取 → 跳帧 → 增强 → 写入缓存
    fn reader_loop(self: Arc<Self>, mut pipe: Option<ChildStdout>, lut_path: Option<PathBuf>) {
        let frame_size = self.config.frame_size();
        let mut raw = vec![0u8; frame_size];

        // LUT 在此处惰性加载，每个处理器仅一次
        let mut enhancer = match FrameEnhancer::new(&self.camera_id, lut_path.as_deref()) {
            Ok(enhancer) => enhancer,
            Err(e) => {
                error!("[{}] 增强器初始化失败: {}", self.camera_id, e);
                self.finish_reader();
                return;
            }
        };

        let mut skip_counter: u32 = 0;
        let mut skip_interval: u32 = SKIP_INTERVAL_INITIAL;
        let mut restart_failures: u32 = 0;
        let mut empty_reads: u32 = 0;
        let mut fps_window = FpsWindow::new();

        while self.running.load(Ordering::Relaxed) {
            let filled = match pipe.as_mut() {
                Some(stdout) => match read_frame_exact(stdout, &mut raw) {
                    Ok(n) => n,
                    Err(e) => {
                        warn!("[{}] 读取解码器管道失败: {}", self.camera_id, e);
                        0
                    }
                },
                None => {
                    thread::sleep(PIPE_WAIT);
                    continue;
                }
            };

            if filled != frame_size {
                warn!(
                    "[{}] 解码器读取不足: {}/{}",
                    self.camera_id, filled, frame_size
                );
                restart_failures += 1;
                empty_reads += 1;

                if empty_reads >= self.config.max_empty_reads {
                    error!("[{}] 长时间无帧，处理器自动关闭", self.camera_id);
                    break;
                }
                if restart_failures > self.config.max_restart_attempts {
                    error!("[{}] 解码器重启次数耗尽，停止处理", self.camera_id);
                    break;
                }
                if !self.running.load(Ordering::Relaxed) {
                    break;
                }

                info!(
                    "[{}] 重启解码器（尝试 {}/{}）",
                    self.camera_id, restart_failures, self.config.max_restart_attempts
                );
                pipe = match self.supervisor.lock().unwrap().restart() {
                    Ok(stdout) => Some(stdout),
                    Err(e) => {
                        // 重启拉不起解码器视为致命错误，不再自动重试
                        error!("[{}] 解码器重启失败: {}", self.camera_id, e);
                        break;
                    }
                };
                thread::sleep(RESTART_BACKOFF);
                continue;
            }

            restart_failures = 0;
            empty_reads = 0;

            // 跳帧：未命中间隔的帧直接丢弃，不做任何拷贝
            skip_counter = (skip_counter + 1) % skip_interval;
            if skip_counter != 0 {
                continue;
            }

            let params = self.params.get();
            let started = Instant::now();
            let enhanced = match enhancer.enhance(&raw, self.config.width, self.config.height, &params)
            {
                Ok(data) => data,
                Err(e) => {
                    error!("[{}] 帧增强失败: {}", self.camera_id, e);
                    thread::sleep(ERROR_BACKOFF);
                    continue;
                }
            };
            let enhance_time = started.elapsed();
            skip_interval = adjust_skip_interval(skip_interval, enhance_time);

            // 先在临界区外准备好两份拷贝，再一次性成对换入缓存
            let original = Frame::new(raw.clone(), self.config.width, self.config.height);
            let enhanced = Frame::new(enhanced, self.config.width, self.config.height);
            {
                let mut slots = self.slots.lock().unwrap();
                slots.original = Some(original);
                slots.enhanced = Some(enhanced);
            }

            if let Some(fps) = fps_window.tick() {
                *self.current_fps.lock().unwrap() = fps;
            }
        }

        self.finish_reader();
    }

    /// 读取线程收尾：标记停止并回收解码器，保证不留僵尸进程
    fn finish_reader(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.supervisor.lock().unwrap().terminate();
        info!("[{}] 读取线程退出", self.camera_id);
    }
}

/// 根据单帧增强耗时自适应调整跳帧间隔，始终限制在 [2, 6]
fn adjust_skip_interval(current: u32, enhance_time: Duration) -> u32 {
    if enhance_time > ENHANCE_SLOW_THRESHOLD && current < SKIP_INTERVAL_MAX {
        current + 1
    } else if enhance_time < ENHANCE_FAST_THRESHOLD && current > SKIP_INTERVAL_MIN {
        current - 1
    } else {
        current
    }
}

/// 1 秒窗口的 FPS 统计
struct FpsWindow {
    frame_count: u32,
    last_time: Instant,
}

impl FpsWindow {
    fn new() -> Self {
        Self {
            frame_count: 0,
            last_time: Instant::now(),
        }
    }

    /// 记一帧；跨过 1 秒窗口时返回该窗口的 FPS
    fn tick(&mut self) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = self.last_time.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = f64::from(self.frame_count) / elapsed.as_secs_f64();
            self.frame_count = 0;
            self.last_time = Instant::now();
            Some(fps)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholder_processor() -> Arc<StreamProcessor> {
        StreamProcessor::start(
            "camera-1",
            "rtsp://localhost:8554/camera-1",
            None,
            StreamConfig::default(),
            Arc::new(ParamStore::new()),
        )
    }

    #[test]
    fn test_skip_interval_increases_when_slow() {
        assert_eq!(adjust_skip_interval(3, Duration::from_millis(70)), 4);
    }

    #[test]
    fn test_skip_interval_saturates_at_max() {
        let mut skip = 3;
        for _ in 0..10 {
            skip = adjust_skip_interval(skip, Duration::from_millis(70));
        }
        assert_eq!(skip, SKIP_INTERVAL_MAX);
    }

    #[test]
    fn test_skip_interval_decreases_when_fast() {
        assert_eq!(adjust_skip_interval(4, Duration::from_millis(10)), 3);
    }

    #[test]
    fn test_skip_interval_saturates_at_min() {
        let mut skip = 4;
        for _ in 0..10 {
            skip = adjust_skip_interval(skip, Duration::from_millis(10));
        }
        assert_eq!(skip, SKIP_INTERVAL_MIN);
    }

    #[test]
    fn test_skip_interval_holds_in_middle_band() {
        assert_eq!(adjust_skip_interval(3, Duration::from_millis(45)), 3);
    }

    #[test]
    fn test_placeholder_camera_never_runs() {
        let processor = placeholder_processor();
        assert!(!processor.is_running());
        assert!(processor.original_frame().is_none());
        assert!(processor.enhanced_frame().is_none());
        assert_eq!(processor.fps(), 0.0);
    }

    #[test]
    fn test_unreachable_camera_never_runs() {
        // 端口拿到后立即释放，连接必然被拒绝
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let processor = StreamProcessor::start(
            "cam-dead",
            &format!("rtsp://127.0.0.1:{}/live", port),
            None,
            StreamConfig::default(),
            Arc::new(ParamStore::new()),
        );
        assert!(!processor.is_running());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let processor = placeholder_processor();
        processor.stop();
        processor.stop();
        assert!(!processor.is_running());
    }

    #[test]
    fn test_param_hook_routes_to_shared_store() {
        let params = Arc::new(ParamStore::new());
        let processor = StreamProcessor::start(
            "camera-1",
            "rtsp://localhost:8554/camera-1",
            None,
            StreamConfig::default(),
            Arc::clone(&params),
        );

        processor.update_params(&EnhanceParamsUpdate {
            gamma: Some(0.5),
            ..Default::default()
        });
        assert_eq!(params.get().gamma, 0.5);
    }

    #[test]
    fn test_fps_window_needs_a_full_second() {
        let mut window = FpsWindow::new();
        assert!(window.tick().is_none());
        assert!(window.tick().is_none());
    }
}
