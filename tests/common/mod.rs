//! Shared test harness for integration tests.
//!
//! [`TestEnv`] lays out an upload and output directory inside a
//! [`TempDir`] and installs fake `ffprobe`/`ffmpeg` shell scripts, so the
//! whole pipeline runs without real media tools. The fake encoder logs each
//! invocation, and marker files change its behaviour per rendition label.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hlsforge::config::Config;
use hlsforge::server::{create_router, AppContext};
use hlsforge::status::JobStatus;
use hlsforge::transcode::Orchestrator;
use hlsforge_common::JobId;
use tempfile::TempDir;

pub const SOURCE: &str = "clip.mp4";

const FAKE_FFMPEG: &str = r#"#!/bin/sh
root='@ROOT@'
for arg in "$@"; do last="$arg"; done
dir=$(dirname "$last")
label=$(basename "$dir")
echo "$label" >> "$root/ffmpeg.log"
if [ -f "$root/fail-$label" ]; then
  echo "Invalid data found when processing input" >&2
  exit 1
fi
if [ -f "$root/latin1-$label" ]; then
  printf 'Metadata title: caf\351\n' >&2
fi
echo "out_time=00:00:03.000000" >&2
echo "progress=continue" >&2
if [ -f "$root/stubborn-$label" ]; then
  trap '' INT TERM
  while true; do sleep 1; done
fi
if [ -f "$root/hang-$label" ]; then
  cat > /dev/null
  exit 255
fi
mkdir -p "$dir"
printf '#EXTM3U\n#EXT-X-PLAYLIST-TYPE:VOD\n#EXT-X-ENDLIST\n' > "$last"
: > "$dir/segment_000.ts"
echo "out_time=00:00:10.000000" >&2
echo "progress=end" >&2
exit 0
"#;

/// A self-contained upload/output tree with fake media tools.
pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
}

impl TestEnv {
    /// Environment whose sources probe as 1920x1080, 10 seconds long.
    pub fn new() -> Self {
        Self::with_source_size(1920, 1080)
    }

    pub fn with_source_size(width: u32, height: u32) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path();

        std::fs::create_dir_all(root.join("uploads")).unwrap();
        std::fs::create_dir_all(root.join("hls")).unwrap();
        std::fs::create_dir_all(root.join("bin")).unwrap();

        let ffprobe = root.join("bin/ffprobe");
        write_script(
            &ffprobe,
            &format!(
                "#!/bin/sh\nprintf '%s\\n' '{{\"streams\":[{{\"codec_type\":\"video\",\"width\":{},\"height\":{}}}],\"format\":{{\"duration\":\"10.000000\"}}}}'\n",
                width, height
            ),
        );

        let ffmpeg = root.join("bin/ffmpeg");
        write_script(
            &ffmpeg,
            &FAKE_FFMPEG.replace("@ROOT@", &root.display().to_string()),
        );

        let mut config = Config::default();
        config.storage.upload_dir = root.join("uploads");
        config.storage.output_dir = root.join("hls");
        config.tools.ffmpeg_path = Some(ffmpeg);
        config.tools.ffprobe_path = Some(ffprobe);
        config.transcode.stop_grace_secs = 1;

        let env = Self { dir, config };
        env.add_source(SOURCE);
        env
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("hls")
    }

    pub fn add_source(&self, name: &str) {
        std::fs::write(self.root().join("uploads").join(name), b"fake media").unwrap();
    }

    pub fn remove_source(&self, name: &str) {
        std::fs::remove_file(self.root().join("uploads").join(name)).unwrap();
    }

    /// Make the fake encoder exit with an error for this label.
    pub fn fail(&self, label: &str) {
        std::fs::write(self.root().join(format!("fail-{}", label)), b"").unwrap();
    }

    /// Make the fake encoder run until it is asked to quit for this label.
    pub fn hang(&self, label: &str) {
        std::fs::write(self.root().join(format!("hang-{}", label)), b"").unwrap();
    }

    /// Make the fake encoder ignore the quit request for this label, so it
    /// has to be killed.
    pub fn stubborn(&self, label: &str) {
        std::fs::write(self.root().join(format!("stubborn-{}", label)), b"").unwrap();
    }

    /// Make the fake encoder print a Latin-1 metadata line for this label.
    pub fn latin1(&self, label: &str) {
        std::fs::write(self.root().join(format!("latin1-{}", label)), b"").unwrap();
    }

    /// How many times the fake encoder was launched for a label.
    pub fn encoder_runs(&self, label: &str) -> usize {
        std::fs::read_to_string(self.root().join("ffmpeg.log"))
            .unwrap_or_default()
            .lines()
            .filter(|l| *l == label)
            .count()
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::from_config(&self.config)
    }

    pub fn master_uris(&self, job_id: &JobId) -> Vec<String> {
        let path = self.output_dir().join(job_id.as_str()).join("master.m3u8");
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect()
    }
}

fn write_script(path: &Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

/// Poll a job's status until `done` accepts it.
pub async fn wait_for<F>(orchestrator: &Orchestrator, job_id: &JobId, done: F) -> JobStatus
where
    F: Fn(&JobStatus) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    loop {
        if let Ok(Some(status)) = orchestrator.status(job_id).await {
            if done(&status) {
                return status;
            }
        }
        if tokio::time::Instant::now() > deadline {
            let last = orchestrator.status(job_id).await.ok().flatten();
            panic!("timed out waiting on job {}: {:#?}", job_id, last);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Start the HTTP API on a random port.
pub async fn with_server(env: &TestEnv) -> (Orchestrator, SocketAddr) {
    let orchestrator = env.orchestrator();
    let ctx = AppContext {
        config: Arc::new(env.config.clone()),
        orchestrator: orchestrator.clone(),
    };
    let app = create_router(ctx);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind random port");
    let addr = listener.local_addr().expect("failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (orchestrator, addr)
}
