//! UCI option registry and `setoption` handling.

use std::collections::HashMap;

/// Print a UCI spin option.
fn print_spin(name: &str, default: impl std::fmt::Display, min: impl std::fmt::Display, max: impl std::fmt::Display) {
    println!("option name {name} type spin default {default} min {min} max {max}");
}

/// Print a UCI check option.
fn print_check(name: &str, default: bool) {
    println!("option name {name} type check default {default}");
}

/// Print a UCI string option.
fn print_string(name: &str, default: &str) {
    let default = if default.is_empty() { "<empty>" } else { default };
    println!("option name {name} type string default {default}");
}

/// Deferred effects the engine applies after a `setoption`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionAction {
    ResizeHash(usize),
    SetThreads(usize),
}

/// All configurable engine options with their clamped current values.
#[derive(Debug, Clone)]
pub struct UciOptions {
    pub hash_mb: usize,
    pub threads: usize,
    pub multipv: u32,
    pub move_overhead_ms: u64,
    pub contempt: i32,
    pub syzygy_path: String,
    pub chess960: bool,
    pub show_wdl: bool,
    pub ponder: bool,
    pub use_nnue: bool,
    pub eval_file: String,
    /// `Style_*` knobs (0..100), stored by lowercase suffix.
    pub style: HashMap<String, u32>,
}

impl Default for UciOptions {
    fn default() -> Self {
        UciOptions {
            hash_mb: 64,
            threads: 1,
            multipv: 1,
            move_overhead_ms: 50,
            contempt: 0,
            syzygy_path: String::new(),
            chess960: false,
            show_wdl: false,
            ponder: false,
            use_nnue: false,
            eval_file: String::new(),
            style: HashMap::new(),
        }
    }
}

impl UciOptions {
    /// Print the `id` block and every option, ending with `uciok`.
    pub fn print(&self) {
        println!("id name sable 0.1.0");
        println!("id author the sable developers");
        print_spin("Hash", self.hash_mb, 1, 1024);
        print_spin("Threads", self.threads, 1, 64);
        print_spin("MultiPV", self.multipv, 1, 10);
        print_spin("MoveOverhead", self.move_overhead_ms, 0, 5000);
        print_spin("Contempt", self.contempt, -100, 100);
        print_string("SyzygyPath", &self.syzygy_path);
        print_check("UCI_Chess960", self.chess960);
        print_check("UCI_ShowWDL", self.show_wdl);
        print_check("Ponder", self.ponder);
        print_check("UseNNUE", self.use_nnue);
        print_string("EvalFile", &self.eval_file);
        print_spin("Style_Aggression", self.style.get("aggression").copied().unwrap_or(50), 0, 100);
        print_spin("Style_Solidity", self.style.get("solidity").copied().unwrap_or(50), 0, 100);
        println!("uciok");
    }

    /// Apply one `setoption`. Returns a deferred action when the engine has
    /// to rebuild a resource.
    pub fn apply(&mut self, name: &str, value: Option<&str>) -> Option<OptionAction> {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "hash" => {
                let mb = value
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(self.hash_mb)
                    .clamp(1, 1024);
                if mb != self.hash_mb {
                    self.hash_mb = mb;
                    return Some(OptionAction::ResizeHash(mb));
                }
            }
            "threads" => {
                let threads = value
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(self.threads)
                    .clamp(1, 64);
                if threads != self.threads {
                    self.threads = threads;
                    return Some(OptionAction::SetThreads(threads));
                }
            }
            "multipv" => {
                if let Some(v) = value.and_then(|v| v.parse::<u32>().ok()) {
                    self.multipv = v.clamp(1, 10);
                }
            }
            "moveoverhead" | "move overhead" => {
                if let Some(v) = value.and_then(|v| v.parse::<u64>().ok()) {
                    self.move_overhead_ms = v.min(5000);
                }
            }
            "contempt" => {
                if let Some(v) = value.and_then(|v| v.parse::<i32>().ok()) {
                    self.contempt = v.clamp(-100, 100);
                }
            }
            "syzygypath" => {
                self.syzygy_path = value.unwrap_or("").to_string();
                if self.syzygy_path == "<empty>" {
                    self.syzygy_path.clear();
                }
            }
            "uci_chess960" => self.chess960 = parse_bool(value, self.chess960),
            "uci_showwdl" => self.show_wdl = parse_bool(value, self.show_wdl),
            "ponder" => self.ponder = parse_bool(value, self.ponder),
            "usennue" => self.use_nnue = parse_bool(value, self.use_nnue),
            "evalfile" => self.eval_file = value.unwrap_or("").to_string(),
            other => {
                if let Some(suffix) = other.strip_prefix("style_") {
                    if let Some(v) = value.and_then(|v| v.parse::<u32>().ok()) {
                        self.style.insert(suffix.to_string(), v.min(100));
                    }
                } else {
                    log::warn!("ignoring unknown option '{name}'");
                }
            }
        }
        None
    }
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(str::trim) {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}
