//! High-resolution wheel capture via a low-level mouse hook.
//!
//! The global listener reports wheel input in whole notches. Precision
//! touchpads and free-spinning wheels deliver fractions of a notch
//! (`WHEEL_DELTA` = 120 units), so while recording a `WH_MOUSE_LL` hook runs
//! on its own thread and forwards `delta / 120.0` to the router.

use crate::capture::listener::InputRouter;
use crate::recorder::error::{RecordingError, RecordingResult};
use crate::utils::{join_with_timeout, spawn_named};
use crossbeam_channel::bounded;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, MSG, MSLLHOOKSTRUCT,
    PM_NOREMOVE, WH_MOUSE_LL, WM_MOUSEHWHEEL, WM_MOUSEWHEEL, WM_QUIT, WM_USER,
};

const WHEEL_DELTA: f64 = 120.0;

thread_local! {
    static HOOK_ROUTER: RefCell<Option<Arc<InputRouter>>> = RefCell::new(None);
}

pub fn current_thread_id() -> u32 {
    unsafe { GetCurrentThreadId() }
}

/// Ask a thread's message loop to exit.
pub fn post_quit(thread_id: u32) -> bool {
    let result = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
    match result {
        Ok(()) => {
            tracing::debug!("Posted WM_QUIT to thread {}", thread_id);
            true
        }
        Err(e) => {
            tracing::warn!("Failed to post WM_QUIT to thread {}: {}", thread_id, e);
            false
        }
    }
}

unsafe extern "system" fn wheel_hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let message = wparam.0 as u32;
        if message == WM_MOUSEWHEEL || message == WM_MOUSEHWHEEL {
            let info = &*(lparam.0 as *const MSLLHOOKSTRUCT);
            // High-order word of mouseData is the signed wheel delta.
            let delta = (info.mouseData >> 16) as i16 as f64 / WHEEL_DELTA;
            let (dx, dy) = if message == WM_MOUSEWHEEL {
                (0.0, delta)
            } else {
                (delta, 0.0)
            };
            let (x, y) = (info.pt.x as f64, info.pt.y as f64);

            HOOK_ROUTER.with(|router| {
                if let Some(router) = router.borrow().as_ref() {
                    router.submit_high_res_wheel(x, y, dx, dy);
                }
            });
        }
    }

    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

/// State shared between `WheelHook::install` and its hook thread.
#[derive(Default)]
struct HookHandshake {
    /// Id of the hook thread, published once its message queue exists
    thread_id: AtomicU32,
    /// Set when the installer gave up waiting; a late hook removes itself
    abandoned: AtomicBool,
    exited: AtomicBool,
}

fn run_hook_loop(
    router: Arc<InputRouter>,
    handshake: Arc<HookHandshake>,
    installed: crossbeam_channel::Sender<RecordingResult<u32>>,
    start_delay: Duration,
) {
    HOOK_ROUTER.with(|slot| *slot.borrow_mut() = Some(router));

    unsafe {
        // Make sure the thread has a message queue before anyone posts to it.
        let mut msg = MSG::default();
        let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
        handshake.thread_id.store(current_thread_id(), Ordering::SeqCst);

        if !start_delay.is_zero() {
            std::thread::sleep(start_delay);
        }

        let hook = match SetWindowsHookExW(WH_MOUSE_LL, Some(wheel_hook_proc), None, 0) {
            Ok(hook) => hook,
            Err(e) => {
                let _ = installed.send(Err(RecordingError::HookInstall(e.to_string())));
                HOOK_ROUTER.with(|slot| *slot.borrow_mut() = None);
                return;
            }
        };

        if handshake.abandoned.load(Ordering::SeqCst) {
            let _ = UnhookWindowsHookEx(hook);
            tracing::debug!("Wheel hook installed after its installer gave up, removed");
            HOOK_ROUTER.with(|slot| *slot.borrow_mut() = None);
            return;
        }

        tracing::debug!("Wheel hook installed");
        let _ = installed.send(Ok(current_thread_id()));

        // Low-level hooks are only called while this thread pumps messages.
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        let _ = UnhookWindowsHookEx(hook);
        tracing::debug!("Wheel hook removed");
    }

    HOOK_ROUTER.with(|slot| *slot.borrow_mut() = None);
}

/// A running wheel hook thread.
pub struct WheelHook {
    thread_id: u32,
    thread: JoinHandle<()>,
}

impl WheelHook {
    /// Install the hook and wait up to `timeout` for confirmation.
    pub fn install(router: Arc<InputRouter>, timeout: Duration) -> RecordingResult<Self> {
        Self::install_after(router, timeout, Duration::ZERO, Arc::default())
    }

    fn install_after(
        router: Arc<InputRouter>,
        timeout: Duration,
        start_delay: Duration,
        handshake: Arc<HookHandshake>,
    ) -> RecordingResult<Self> {
        let (tx, rx) = bounded(1);
        let thread_handshake = handshake.clone();
        let thread = spawn_named("wheel-hook", move || {
            run_hook_loop(router, thread_handshake.clone(), tx, start_delay);
            thread_handshake.exited.store(true, Ordering::SeqCst);
        })
        .map_err(|e| RecordingError::HookInstall(format!("Failed to spawn hook thread: {}", e)))?;

        match rx.recv_timeout(timeout) {
            Ok(Ok(thread_id)) => Ok(Self { thread_id, thread }),
            Ok(Err(e)) => {
                join_with_timeout(thread, timeout);
                Err(e)
            }
            Err(_) => {
                // Either the late hook sees the flag and unhooks, or it is
                // already pumping and the quit message ends it.
                handshake.abandoned.store(true, Ordering::SeqCst);
                let thread_id = handshake.thread_id.load(Ordering::SeqCst);
                if thread_id != 0 {
                    post_quit(thread_id);
                }
                join_with_timeout(thread, timeout);
                Err(RecordingError::HookInstall(format!(
                    "Wheel hook not confirmed within {:?}",
                    timeout
                )))
            }
        }
    }

    /// Remove the hook and wait (bounded) for its thread.
    pub fn stop(self, timeout: Duration) -> bool {
        post_quit(self.thread_id);
        join_with_timeout(self.thread, timeout)
    }
}
