// FFI bridge for GLMedia
// Provides C ABI + JNI entrypoints over the player service.

mod host_provider;

use glmedia_core::{MediaError, MediaReference, PlayerState, Result};
use glmedia_player::{PlayerConfig, PlayerService};
use glmedia_renderer_soft::{SoftRendererFactory, StatsSink};
use glmedia_resolver::PermissionFlag;
use host_provider::HostContentProvider;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::path::PathBuf;
use std::sync::{Arc, Once};

/// One registered player and the collaborators the host talks to directly
struct NativePlayer {
    service: PlayerService,
    provider: Arc<HostContentProvider>,
    permission: Arc<PermissionFlag>,
}

impl NativePlayer {
    fn new(cache_dir: PathBuf) -> Result<Self> {
        let provider = Arc::new(HostContentProvider::new());
        let permission = Arc::new(PermissionFlag::new(false));
        let service = PlayerService::new(
            PlayerConfig::with_cache_dir(cache_dir),
            provider.clone(),
            permission.clone(),
            Arc::new(SoftRendererFactory::new(Arc::new(StatsSink::new()))),
        )?;
        Ok(Self {
            service,
            provider,
            permission,
        })
    }

    fn pick_and_prepare(&self, uri: &str, data_path: Option<PathBuf>, fd: Option<i32>) -> Result<()> {
        self.provider.register(uri, data_path, fd);
        self.service.pick_and_prepare(MediaReference::new(uri))
    }
}

static PLAYER_REGISTRY: Lazy<Mutex<HashMap<i64, Arc<NativePlayer>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_PLAYER_ID: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(1));
static INIT_LOGGER: Once = Once::new();

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(all(target_os = "android", feature = "android"))]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Debug)
                    .with_tag("GLMediaKit"),
            );
        }

        #[cfg(not(all(target_os = "android", feature = "android")))]
        {
            let _ = env_logger::builder()
                .is_test(false)
                .filter_level(log::LevelFilter::Info)
                .try_init();
        }
    });
}

fn create_player(cache_dir: PathBuf) -> i64 {
    init_logging();
    let player = match NativePlayer::new(cache_dir) {
        Ok(player) => player,
        Err(err) => {
            log::error!("Failed to create player: {}", err);
            return err.code() as i64;
        }
    };

    let mut next = NEXT_PLAYER_ID.lock();
    let id = *next;
    *next += 1;
    drop(next);

    PLAYER_REGISTRY.lock().insert(id, Arc::new(player));
    log::info!("Registered player {}", id);
    id
}

fn destroy_player(id: i64) -> i32 {
    // Drop outside the registry lock: teardown joins the command stream.
    // A call still running on another thread finishes the teardown instead.
    let player = PLAYER_REGISTRY.lock().remove(&id);
    match player {
        Some(player) => {
            drop(player);
            log::info!("Destroyed player {}", id);
            0
        }
        None => invalid_player().code(),
    }
}

fn invalid_player() -> MediaError {
    MediaError::InvalidState("Invalid player ID".into())
}

/// Run `f` outside the registry lock; surface destroy and purge block on the
/// player's command stream
fn with_player<R>(id: i64, f: impl FnOnce(&NativePlayer) -> Result<R>) -> Result<R> {
    let player = PLAYER_REGISTRY
        .lock()
        .get(&id)
        .cloned()
        .ok_or_else(invalid_player)?;
    f(&player)
}

fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            err.code()
        }
    }
}

fn get_state(id: i64) -> i32 {
    match with_player(id, |p| Ok(p.service.get_state())) {
        Ok(state) => state.code(),
        Err(err) => {
            log::error!("Failed to get state: {}", err);
            err.code()
        }
    }
}

fn purge_cache(id: i64) -> i64 {
    match with_player(id, |p| p.service.purge_cache()) {
        Ok(removed) => removed as i64,
        Err(err) => {
            log::error!("Failed to purge cache: {}", err);
            err.code() as i64
        }
    }
}

fn surface_created(id: i64, token: u64) -> i64 {
    match with_player(id, |p| Ok(p.service.surface_created(token))) {
        Ok(handle) => handle.id() as i64,
        Err(err) => {
            log::error!("Failed to register surface: {}", err);
            err.code() as i64
        }
    }
}

fn surface_changed(id: i64, width: i32, height: i32) -> i32 {
    if width < 0 || height < 0 {
        return MediaError::Other(format!("invalid surface size {}x{}", width, height)).code();
    }
    to_code(with_player(id, |p| {
        p.service.surface_changed(width as u32, height as u32);
        Ok(())
    }))
}

fn surface_destroyed(id: i64) -> i32 {
    to_code(with_player(id, |p| {
        p.service.surface_destroyed();
        Ok(())
    }))
}

fn set_permission(id: i64, granted: bool) -> i32 {
    to_code(with_player(id, |p| {
        p.permission.set_granted(granted);
        Ok(())
    }))
}

/// Read an optional C string; null means absent
unsafe fn optional_c_str(ptr: *const c_char) -> Result<Option<String>> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|e| MediaError::Other(format!("invalid UTF-8: {}", e)))
}

fn optional_fd(fd: i32) -> Option<i32> {
    (fd >= 0).then_some(fd)
}

// -------------------------------
// C ABI
// -------------------------------

/// Create a player whose streamed copies go to `cache_dir`.
/// Returns the player ID, or a negative error code.
#[no_mangle]
pub extern "C" fn glmedia_player_create(cache_dir: *const c_char) -> i64 {
    match unsafe { optional_c_str(cache_dir) } {
        Ok(Some(dir)) => create_player(PathBuf::from(dir)),
        Ok(None) => create_player(PlayerConfig::default().resolver.scratch_dir),
        Err(err) => err.code() as i64,
    }
}

/// `data_path` may be null; `fd` is a detached descriptor or -1
#[no_mangle]
pub extern "C" fn glmedia_player_pick_and_prepare(
    player_id: i64,
    uri: *const c_char,
    data_path: *const c_char,
    fd: i32,
) -> i32 {
    let uri = match unsafe { optional_c_str(uri) } {
        Ok(Some(uri)) => uri,
        Ok(None) => return MediaError::SourceUnreadable("null uri".into()).code(),
        Err(err) => return err.code(),
    };
    let data_path = match unsafe { optional_c_str(data_path) } {
        Ok(path) => path.map(PathBuf::from),
        Err(err) => return err.code(),
    };
    to_code(with_player(player_id, |p| {
        p.pick_and_prepare(&uri, data_path, optional_fd(fd))
    }))
}

#[no_mangle]
pub extern "C" fn glmedia_player_playback(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.service.playback()))
}

#[no_mangle]
pub extern "C" fn glmedia_player_pause(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.service.pause()))
}

#[no_mangle]
pub extern "C" fn glmedia_player_release(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.service.release()))
}

#[no_mangle]
pub extern "C" fn glmedia_player_start(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.service.start()))
}

#[no_mangle]
pub extern "C" fn glmedia_player_stop(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.service.stop()))
}

/// Returns the surface id, or a negative error code
#[no_mangle]
pub extern "C" fn glmedia_player_surface_created(player_id: i64, window_token: u64) -> i64 {
    surface_created(player_id, window_token)
}

#[no_mangle]
pub extern "C" fn glmedia_player_surface_changed(player_id: i64, width: i32, height: i32) -> i32 {
    surface_changed(player_id, width, height)
}

/// Blocks until the player no longer draws to the surface
#[no_mangle]
pub extern "C" fn glmedia_player_surface_destroyed(player_id: i64) -> i32 {
    surface_destroyed(player_id)
}

#[no_mangle]
pub extern "C" fn glmedia_player_set_permission_granted(player_id: i64, granted: bool) -> i32 {
    set_permission(player_id, granted)
}

#[no_mangle]
pub extern "C" fn glmedia_player_get_state(player_id: i64) -> i32 {
    get_state(player_id)
}

/// Returns the number of removed copies, or a negative error code
#[no_mangle]
pub extern "C" fn glmedia_player_purge_cache(player_id: i64) -> i64 {
    purge_cache(player_id)
}

#[no_mangle]
pub extern "C" fn glmedia_player_destroy(player_id: i64) -> i32 {
    destroy_player(player_id)
}

// -------------------------------
// JNI bindings for Android/JVM
// -------------------------------
#[cfg(any(feature = "android", feature = "desktop"))]
mod jni_bridge {
    use super::*;
    use jni::objects::{JClass, JString};
    use jni::sys::{jboolean, jint, jlong, JNI_TRUE};
    use jni::JNIEnv;

    fn jstring_to_string(env: &mut JNIEnv, jstr: &JString) -> Result<Option<String>> {
        if jstr.is_null() {
            return Ok(None);
        }
        let java_str = env
            .get_string(jstr)
            .map_err(|e| MediaError::Other(e.to_string()))?;
        Ok(Some(java_str.into()))
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativeCreate(
        mut env: JNIEnv,
        _class: JClass,
        cache_dir: JString,
    ) -> jlong {
        match jstring_to_string(&mut env, &cache_dir) {
            Ok(Some(dir)) => create_player(PathBuf::from(dir)),
            Ok(None) => create_player(PlayerConfig::default().resolver.scratch_dir),
            Err(err) => {
                log::error!("Failed to read cache dir: {}", err);
                err.code() as jlong
            }
        }
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativePickAndPrepare(
        mut env: JNIEnv,
        _class: JClass,
        player_id: jlong,
        uri: JString,
        data_path: JString,
        fd: jint,
    ) -> jint {
        let uri = match jstring_to_string(&mut env, &uri) {
            Ok(Some(uri)) => uri,
            Ok(None) => return MediaError::SourceUnreadable("null uri".into()).code(),
            Err(err) => {
                log::error!("Failed to read uri: {}", err);
                return err.code();
            }
        };
        let data_path = match jstring_to_string(&mut env, &data_path) {
            Ok(path) => path.map(PathBuf::from),
            Err(err) => {
                log::error!("Failed to read data path: {}", err);
                return err.code();
            }
        };
        to_code(with_player(player_id, |p| {
            p.pick_and_prepare(&uri, data_path, optional_fd(fd))
        }))
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativePlayback(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
    ) -> jint {
        glmedia_player_playback(player_id)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativePause(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
    ) -> jint {
        glmedia_player_pause(player_id)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativeRelease(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
    ) -> jint {
        glmedia_player_release(player_id)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativeStart(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
    ) -> jint {
        glmedia_player_start(player_id)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativeStop(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
    ) -> jint {
        glmedia_player_stop(player_id)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativeSurfaceCreated(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
        window_token: jlong,
    ) -> jlong {
        surface_created(player_id, window_token as u64)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativeSurfaceChanged(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
        width: jint,
        height: jint,
    ) -> jint {
        surface_changed(player_id, width, height)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativeSurfaceDestroyed(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
    ) -> jint {
        surface_destroyed(player_id)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativeSetPermissionGranted(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
        granted: jboolean,
    ) -> jint {
        set_permission(player_id, granted == JNI_TRUE)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativeGetPlayerState(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
    ) -> jint {
        get_state(player_id)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativePurgeCache(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
    ) -> jlong {
        purge_cache(player_id)
    }

    #[no_mangle]
    pub extern "system" fn Java_io_glmedia_NativePlayer_nativeDestroy(
        _env: JNIEnv,
        _class: JClass,
        player_id: jlong,
    ) -> jint {
        destroy_player(player_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;
    use std::time::{Duration, Instant};

    fn wait_for_state(id: i64, state: PlayerState) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if glmedia_player_get_state(id) == state.code() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_unknown_player_id() {
        let code = invalid_player().code();
        assert_eq!(glmedia_player_playback(-42), code);
        assert_eq!(glmedia_player_get_state(-42), code);
        assert_eq!(glmedia_player_destroy(-42), code);
    }

    #[test]
    fn test_full_session_over_c_abi() {
        let cache = tempfile::tempdir().unwrap();
        let media = tempfile::tempdir().unwrap();
        let clip = media.path().join("clip.mp4");
        std::fs::write(&clip, vec![1u8; 256 * 1024]).unwrap();

        let cache_dir = CString::new(cache.path().to_string_lossy().as_bytes()).unwrap();
        let id = glmedia_player_create(cache_dir.as_ptr());
        assert!(id > 0);
        assert_eq!(glmedia_player_get_state(id), PlayerState::Idle.code());

        // Permission denied: the DATA path is ignored and the URI is copied
        let uri = CString::new(clip.to_string_lossy().as_bytes()).unwrap();
        let data_path = CString::new("/nonexistent/clip.mp4").unwrap();
        assert_eq!(glmedia_player_playback(id), 0);
        assert_eq!(
            glmedia_player_pick_and_prepare(id, uri.as_ptr(), data_path.as_ptr(), -1),
            0
        );
        assert!(wait_for_state(id, PlayerState::Prepared));

        assert!(glmedia_player_surface_created(id, 0xbeef) > 0);
        assert_eq!(glmedia_player_surface_changed(id, 1280, 720), 0);
        assert!(wait_for_state(id, PlayerState::Playing));

        assert_eq!(glmedia_player_surface_destroyed(id), 0);
        assert_eq!(glmedia_player_get_state(id), PlayerState::Paused.code());

        assert_eq!(glmedia_player_purge_cache(id), 0);
        assert_eq!(glmedia_player_release(id), 0);
        assert!(wait_for_state(id, PlayerState::Released));
        assert_eq!(glmedia_player_destroy(id), 0);
        assert_eq!(glmedia_player_get_state(id), invalid_player().code());
    }

    #[test]
    fn test_player_calls_do_not_hold_registry() {
        let cache = tempfile::tempdir().unwrap();
        let cache_dir = CString::new(cache.path().to_string_lossy().as_bytes()).unwrap();
        let id = glmedia_player_create(cache_dir.as_ptr());
        assert!(glmedia_player_surface_created(id, 0x51) > 0);
        assert!(wait_for_state(id, PlayerState::SurfaceBound));

        // Registry lookups from inside a call, as another thread would do mid-destroy
        let code = to_code(with_player(id, |p| {
            assert_eq!(glmedia_player_get_state(id), PlayerState::SurfaceBound.code());
            p.service.surface_destroyed();
            assert_eq!(glmedia_player_get_state(id), PlayerState::Idle.code());
            Ok(())
        }));
        assert_eq!(code, 0);
        assert_eq!(glmedia_player_destroy(id), 0);
    }

    #[test]
    fn test_null_uri_is_rejected() {
        let cache = tempfile::tempdir().unwrap();
        let cache_dir = CString::new(cache.path().to_string_lossy().as_bytes()).unwrap();
        let id = glmedia_player_create(cache_dir.as_ptr());

        let code = glmedia_player_pick_and_prepare(id, ptr::null(), ptr::null(), -1);
        assert_eq!(code, MediaError::SourceUnreadable(String::new()).code());
        assert_eq!(glmedia_player_set_permission_granted(id, true), 0);
        assert_eq!(glmedia_player_surface_changed(id, -1, 10), MediaError::Other(String::new()).code());
        assert_eq!(glmedia_player_destroy(id), 0);
    }
}
