//! # Sidecar Runtime
//!
//! The LLM is an external child process (a llama.cpp CLI) that consumes
//! a prompt and emits text. [`SidecarRuntime`] is the seam tests mock;
//! [`LlamaCppRuntime`] is the production implementation: argument
//! construction, per-call timeout with kill-on-expiry, and stderr
//! capture on nonzero exit.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{LlmError, LlmResult};

/// Sampling and execution parameters for one generation call.
#[derive(Debug, Clone)]
pub struct LlamaParams {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub repeat_penalty: f64,
    pub seed: u64,
    pub ctx: u32,
    pub n_predict: u32,
    pub threads: Option<u32>,
    pub batch: Option<u32>,
    pub stop: Vec<String>,
    pub timeout_sec: u64,
}

impl Default for LlamaParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.95,
            top_k: 40,
            repeat_penalty: 1.1,
            seed: 42,
            ctx: 4096,
            n_predict: 256,
            threads: None,
            batch: None,
            stop: Vec::new(),
            timeout_sec: 120,
        }
    }
}

/// Anything that can turn a prompt into text under the given parameters.
pub trait SidecarRuntime {
    fn generate(&self, prompt: &str, params: &LlamaParams) -> LlmResult<String>;

    /// Identifier recorded in the audit log (model path or name).
    fn model_id(&self) -> String;
}

/// llama.cpp CLI invocation.
#[derive(Debug, Clone)]
pub struct LlamaCppRuntime {
    llama_bin: PathBuf,
    model_path: PathBuf,
    pub params: LlamaParams,
}

impl LlamaCppRuntime {
    pub fn new(llama_bin: PathBuf, model_path: PathBuf, params: LlamaParams) -> Self {
        Self {
            llama_bin,
            model_path,
            params,
        }
    }

    fn build_args(&self, prompt: &str, params: &LlamaParams) -> Vec<String> {
        let threads = params
            .threads
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(4, |n| n.get() as u32));
        let mut args = vec![
            "-m".to_string(),
            self.model_path.display().to_string(),
            "-p".to_string(),
            prompt.to_string(),
            "-n".to_string(),
            params.n_predict.to_string(),
            "-c".to_string(),
            params.ctx.to_string(),
            "-t".to_string(),
            threads.to_string(),
            "--temp".to_string(),
            params.temperature.to_string(),
            "--top-p".to_string(),
            params.top_p.to_string(),
            "--top-k".to_string(),
            params.top_k.to_string(),
            "--repeat-penalty".to_string(),
            params.repeat_penalty.to_string(),
            "--seed".to_string(),
            params.seed.to_string(),
        ];
        if let Some(batch) = params.batch {
            args.push("--batch-size".to_string());
            args.push(batch.to_string());
        }
        for stop in &params.stop {
            if !stop.is_empty() {
                args.push("--stop".to_string());
                args.push(stop.clone());
            }
        }
        args.push("--no-display-prompt".to_string());
        args.push("--silent".to_string());
        args
    }

    /// Best-effort version probe.
    pub fn healthcheck(&self) -> bool {
        Command::new(&self.llama_bin)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl SidecarRuntime for LlamaCppRuntime {
    fn generate(&self, prompt: &str, params: &LlamaParams) -> LlmResult<String> {
        if !self.llama_bin.exists() {
            return Err(LlmError::Runtime(format!(
                "llama.cpp binary not found: {}",
                self.llama_bin.display()
            )));
        }
        if !self.model_path.exists() {
            return Err(LlmError::Runtime(format!(
                "GGUF model not found: {}",
                self.model_path.display()
            )));
        }

        let args = self.build_args(prompt, params);
        debug!(bin = %self.llama_bin.display(), timeout = params.timeout_sec, "spawning sidecar");

        let mut child = Command::new(&self.llama_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = spawn_reader(stdout);
        let stderr_reader = spawn_reader(stderr);

        let deadline = Instant::now() + Duration::from_secs(params.timeout_sec);
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(LlmError::Timeout {
                    seconds: params.timeout_sec,
                });
            }
            std::thread::sleep(Duration::from_millis(25));
        };

        let stdout_text = collect_reader(stdout_reader);
        let stderr_text = collect_reader(stderr_reader);

        if !status.success() {
            let detail = if stderr_text.trim().is_empty() {
                stdout_text.trim().to_string()
            } else {
                stderr_text.trim().to_string()
            };
            let detail = if detail.is_empty() {
                format!("exit status {status}")
            } else {
                truncate(&detail, 4000)
            };
            return Err(LlmError::Runtime(detail));
        }

        Ok(stdout_text.trim().to_string())
    }

    fn model_id(&self) -> String {
        self.model_path.display().to_string()
    }
}

fn spawn_reader<R: std::io::Read + Send + 'static>(
    source: Option<R>,
) -> Option<mpsc::Receiver<String>> {
    let mut source = source?;
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = std::io::Read::read_to_string(&mut source, &mut buf);
        let _ = tx.send(buf);
    });
    Some(rx)
}

fn collect_reader(rx: Option<mpsc::Receiver<String>>) -> String {
    rx.and_then(|rx| rx.recv().ok()).unwrap_or_default()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

/// Resolve the llama.cpp CLI executable.
///
/// Priority: an explicit override, then `<data_dir>/bin` and
/// `<app_dir>/bin` for `llama-cli` and the legacy `main` name.
pub fn find_llama_bin(
    explicit: Option<&Path>,
    app_dir: &Path,
    data_dir: &Path,
) -> LlmResult<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    for base in ["llama-cli", "main"] {
        for root in [data_dir.join("bin"), app_dir.join("bin")] {
            let candidate = root.join(base);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }
    Err(LlmError::Runtime(
        "llama.cpp binary not found; provide an explicit path to llama-cli/main".into(),
    ))
}

/// Resolve the GGUF model path: an explicit override, or exactly one
/// `*.gguf` in `model_dir`.
pub fn find_gguf_model(explicit: Option<&Path>, model_dir: &Path) -> LlmResult<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let mut ggufs: Vec<PathBuf> = std::fs::read_dir(model_dir)
        .map_err(|e| LlmError::Runtime(format!("cannot read {}: {e}", model_dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "gguf"))
        .collect();
    ggufs.sort();
    match ggufs.len() {
        1 => Ok(ggufs.remove(0)),
        n => Err(LlmError::Runtime(format!(
            "expected exactly one .gguf in {}, found {n}",
            model_dir.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn build_args_cover_all_sampling_params() {
        let runtime = LlamaCppRuntime::new(
            PathBuf::from("/bin/llama-cli"),
            PathBuf::from("/models/m.gguf"),
            LlamaParams::default(),
        );
        let params = LlamaParams {
            batch: Some(64),
            stop: vec!["\n\n".into()],
            ..Default::default()
        };
        let args = runtime.build_args("PROMPT", &params);
        let joined = args.join(" ");
        for flag in [
            "-m", "-p", "-n", "-c", "-t", "--temp", "--top-p", "--top-k",
            "--repeat-penalty", "--seed", "--batch-size", "--stop",
        ] {
            assert!(joined.contains(flag), "missing {flag}");
        }
        assert!(args.contains(&"PROMPT".to_string()));
        assert!(args.contains(&"0.1".to_string()));
        assert!(args.contains(&"42".to_string()));
    }

    #[test]
    fn missing_binary_is_runtime_error() {
        let runtime = LlamaCppRuntime::new(
            PathBuf::from("/nonexistent/llama-cli"),
            PathBuf::from("/nonexistent/m.gguf"),
            LlamaParams::default(),
        );
        let err = runtime
            .generate("p", &LlamaParams::default())
            .unwrap_err();
        assert!(matches!(err, LlmError::Runtime(_)));
    }

    #[cfg(unix)]
    #[test]
    fn echo_script_round_trips_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("fake-llama");
        fs::write(&bin, "#!/bin/sh\necho '{\"ok\": true}'\n").unwrap();
        make_executable(&bin);
        let model = dir.path().join("m.gguf");
        fs::write(&model, b"gguf").unwrap();

        let runtime = LlamaCppRuntime::new(bin, model, LlamaParams::default());
        let out = runtime.generate("prompt", &LlamaParams::default()).unwrap();
        assert_eq!(out, "{\"ok\": true}");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_surfaces_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("fake-llama");
        fs::write(&bin, "#!/bin/sh\necho 'model load failed' >&2\nexit 3\n").unwrap();
        make_executable(&bin);
        let model = dir.path().join("m.gguf");
        fs::write(&model, b"gguf").unwrap();

        let runtime = LlamaCppRuntime::new(bin, model, LlamaParams::default());
        let err = runtime.generate("prompt", &LlamaParams::default()).unwrap_err();
        match err {
            LlmError::Runtime(detail) => assert!(detail.contains("model load failed")),
            other => panic!("expected Runtime, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("fake-llama");
        fs::write(&bin, "#!/bin/sh\nsleep 30\n").unwrap();
        make_executable(&bin);
        let model = dir.path().join("m.gguf");
        fs::write(&model, b"gguf").unwrap();

        let runtime = LlamaCppRuntime::new(bin, model, LlamaParams::default());
        let params = LlamaParams {
            timeout_sec: 1,
            ..Default::default()
        };
        let started = Instant::now();
        let err = runtime.generate("prompt", &params).unwrap_err();
        assert!(matches!(err, LlmError::Timeout { seconds: 1 }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    #[test]
    fn find_gguf_model_requires_exactly_one() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_gguf_model(None, dir.path()).is_err());

        fs::write(dir.path().join("a.gguf"), b"x").unwrap();
        assert!(find_gguf_model(None, dir.path()).is_ok());

        fs::write(dir.path().join("b.gguf"), b"y").unwrap();
        assert!(find_gguf_model(None, dir.path()).is_err());
    }

    #[test]
    fn find_llama_bin_probes_conventional_locations() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let app = dir.path().join("app");
        assert!(find_llama_bin(None, &app, &data).is_err());

        fs::create_dir_all(data.join("bin")).unwrap();
        fs::write(data.join("bin/llama-cli"), b"#!/bin/sh\n").unwrap();
        let found = find_llama_bin(None, &app, &data).unwrap();
        assert!(found.ends_with("bin/llama-cli"));

        let explicit = dir.path().join("custom");
        assert_eq!(
            find_llama_bin(Some(&explicit), &app, &data).unwrap(),
            explicit
        );
    }
}
