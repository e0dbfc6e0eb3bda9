//! End-to-end checks against the genuine loader and spawn machinery.
//!
//! These tests drive the executor with the real `DlNext` resolver, using a
//! `true` binary as the relay so the rerouted process actually starts and
//! exits cleanly.

use std::ffi::CString;
use std::os::raw::c_char;
use std::path::Path;
use std::ptr;

use wiretap_shim::executor::{Executor, ExecutorError};
use wiretap_shim::resolver::DlNext;
use wiretap_shim::session;

fn true_binary() -> &'static str {
    if Path::new("/bin/true").exists() {
        "/bin/true"
    } else {
        "/usr/bin/true"
    }
}

struct Fixture {
    _env: Vec<CString>,
    env_ptrs: Vec<*const c_char>,
    _argv: Vec<CString>,
    argv_ptrs: Vec<*const c_char>,
}

impl Fixture {
    fn new(env: &[String], argv: &[&str]) -> Self {
        let env: Vec<CString> = env
            .iter()
            .map(|e| CString::new(e.as_str()).unwrap())
            .collect();
        let mut env_ptrs: Vec<*const c_char> = env.iter().map(|e| e.as_ptr()).collect();
        env_ptrs.push(ptr::null());
        let argv: Vec<CString> = argv.iter().map(|a| CString::new(*a).unwrap()).collect();
        let mut argv_ptrs: Vec<*const c_char> = argv.iter().map(|a| a.as_ptr()).collect();
        argv_ptrs.push(ptr::null());
        Self {
            _env: env,
            env_ptrs,
            _argv: argv,
            argv_ptrs,
        }
    }

    fn session(&self) -> session::Session<'_> {
        unsafe { session::capture(self.env_ptrs.as_ptr()) }
    }

    fn argv(&self) -> *const *const c_char {
        self.argv_ptrs.as_ptr()
    }
}

fn traced_env() -> Vec<String> {
    vec![
        "INTERCEPT_REPORT_DESTINATION=/tmp/wiretap.report".to_owned(),
        "INTERCEPT_SESSION_LIBRARY=/lib/libwiretap_shim.so".to_owned(),
        format!("INTERCEPT_REPORT_COMMAND={}", true_binary()),
    ]
}

fn wait_for_exit(pid: libc::pid_t) -> i32 {
    let mut status: libc::c_int = 0;
    assert_ne!(unsafe { libc::waitpid(pid, &mut status, 0) }, -1);
    assert!(libc::WIFEXITED(status));
    libc::WEXITSTATUS(status)
}

const EMPTY_ENVP: &[*mut c_char] = &[ptr::null_mut()];

#[test]
fn posix_spawn_reroutes_through_the_relay_process() {
    let fixture = Fixture::new(&traced_env(), &["cc", "-c", "a.c"]);
    let session = fixture.session();
    let executor = Executor::new(&session, &DlNext);

    let path = CString::new("/usr/bin/cc").unwrap();
    let mut pid: libc::pid_t = 0;
    let status = unsafe {
        executor.posix_spawn(
            &mut pid,
            path.as_ptr(),
            ptr::null(),
            ptr::null(),
            fixture.argv() as *const *mut c_char,
            EMPTY_ENVP.as_ptr(),
        )
    }
    .expect("interception should be active");

    // The relay (a `true` binary here) started in place of /usr/bin/cc and
    // ignored the encoded vector.
    assert_eq!(status, 0);
    assert!(pid > 0);
    assert_eq!(wait_for_exit(pid), 0);
}

#[test]
fn posix_spawnp_reroutes_with_file_semantics() {
    let fixture = Fixture::new(&traced_env(), &["make"]);
    let session = fixture.session();
    let executor = Executor::new(&session, &DlNext);

    let file = CString::new("make").unwrap();
    let mut pid: libc::pid_t = 0;
    let status = unsafe {
        executor.posix_spawnp(
            &mut pid,
            file.as_ptr(),
            ptr::null(),
            ptr::null(),
            fixture.argv() as *const *mut c_char,
            EMPTY_ENVP.as_ptr(),
        )
    }
    .expect("interception should be active");

    assert_eq!(status, 0);
    assert_eq!(wait_for_exit(pid), 0);
}

#[test]
fn untraced_process_disables_interception() {
    let fixture = Fixture::new(&["HOME=/root".to_owned()], &["cc"]);
    let session = fixture.session();
    let executor = Executor::new(&session, &DlNext);

    let path = CString::new("/usr/bin/cc").unwrap();
    let mut pid: libc::pid_t = 0;
    let err = unsafe {
        executor.posix_spawn(
            &mut pid,
            path.as_ptr(),
            ptr::null(),
            ptr::null(),
            fixture.argv() as *const *mut c_char,
            EMPTY_ENVP.as_ptr(),
        )
    }
    .unwrap_err();
    assert!(matches!(err, ExecutorError::Disabled));
}

#[test]
fn exported_entry_point_falls_back_to_genuine_spawn() {
    // The test process carries no session variables, so the exported
    // posix_spawn must delegate to the genuine libc implementation and the
    // target must run unmodified.
    let target = CString::new(true_binary()).unwrap();
    let argv = [CString::new("true").unwrap()];
    let argv_ptrs = [argv[0].as_ptr() as *mut c_char, ptr::null_mut()];

    let mut pid: libc::pid_t = 0;
    let status = unsafe {
        wiretap_shim::posix_spawn(
            &mut pid,
            target.as_ptr(),
            ptr::null(),
            ptr::null(),
            argv_ptrs.as_ptr(),
            EMPTY_ENVP.as_ptr(),
        )
    };
    assert_eq!(status, 0);
    assert_eq!(wait_for_exit(pid), 0);
}

#[test]
fn relay_vector_reaches_the_relay_verbatim() {
    // Spawn a shell as the relay and make it echo its argv into a file, so
    // the vector crossing the real process boundary can be inspected.
    let dir = std::env::temp_dir().join(format!("wiretap-itest-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let script = dir.join("relay.sh");
    let out = dir.join("argv.txt");
    std::fs::write(
        &script,
        format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > {}\n", out.display()),
    )
    .unwrap();
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let env = vec![
        "INTERCEPT_REPORT_DESTINATION=/tmp/r".to_owned(),
        "INTERCEPT_SESSION_LIBRARY=/lib/s.so".to_owned(),
        format!("INTERCEPT_REPORT_COMMAND={}", script.display()),
    ];
    let fixture = Fixture::new(&env, &["cc", "-c", "a.c"]);
    let session = fixture.session();
    let executor = Executor::new(&session, &DlNext);

    let path = CString::new("/usr/bin/cc").unwrap();
    let mut pid: libc::pid_t = 0;
    let path_var = CString::new("PATH=/bin:/usr/bin").unwrap();
    let envp = [path_var.as_ptr() as *mut c_char, ptr::null_mut()];
    let status = unsafe {
        executor.posix_spawn(
            &mut pid,
            path.as_ptr(),
            ptr::null(),
            ptr::null(),
            fixture.argv() as *const *mut c_char,
            envp.as_ptr(),
        )
    }
    .expect("interception should be active");
    assert_eq!(status, 0);
    assert_eq!(wait_for_exit(pid), 0);

    let recorded = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = recorded.lines().collect();
    assert_eq!(
        lines,
        vec![
            "--report-destination",
            "/tmp/r",
            "--session-library",
            "/lib/s.so",
            "--exec-path",
            "/usr/bin/cc",
            "--exec-command",
            "cc",
            "-c",
            "a.c",
        ]
    );

    let _ = std::fs::remove_dir_all(&dir);
}
