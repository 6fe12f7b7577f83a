//! Lazy SMP: a pool of long-lived helper threads sharing the transposition
//! table.
//!
//! Helpers keep their own `SearchState` (histories, killers, repetition
//! stack) across searches and park on a condition variable between `go`
//! commands. Work diversification comes from per-thread depth offsets;
//! coordination happens only through the shared table and the stop flag.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::board::{Board, Move};
use crate::eval::Evaluator;
use crate::tb::Tablebases;
use crate::tt::TranspositionTable;

use super::iterative::{search_root, SearchResult};
use super::{InfoCallback, SearchLimits, SearchState};

/// Stack size for search threads; deep PV lines recurse hard.
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

/// A helper thread clearly better than the main thread by this margin gets
/// to override the reported move.
const HELPER_OVERRIDE_MARGIN: i32 = 50;

/// Everything a helper needs for one search.
pub struct SearchJob {
    pub board: Board,
    pub limits: SearchLimits,
    pub tt: Arc<TranspositionTable>,
    pub stop: Arc<AtomicBool>,
    pub global_nodes: Arc<AtomicU64>,
    pub game_history: Vec<u64>,
    pub contempt: i32,
    pub evaluator: Arc<dyn Evaluator>,
    pub tb: Arc<dyn Tablebases>,
    results: Arc<ResultSink>,
}

/// Outcome from one helper.
#[derive(Clone, Debug)]
struct WorkerResult {
    best_move: Option<Move>,
    score: i32,
    depth: i32,
}

/// Collects helper results; the main thread blocks here after stopping.
struct ResultSink {
    results: Mutex<Vec<WorkerResult>>,
    done: Condvar,
}

impl ResultSink {
    fn new() -> Self {
        ResultSink {
            results: Mutex::new(Vec::new()),
            done: Condvar::new(),
        }
    }

    fn submit(&self, result: WorkerResult) {
        let mut guard = self.results.lock();
        guard.push(result);
        self.done.notify_all();
    }

    fn wait_for(&self, count: usize) -> Vec<WorkerResult> {
        let mut guard = self.results.lock();
        while guard.len() < count {
            self.done.wait(&mut guard);
        }
        guard.clone()
    }
}

enum Command {
    Idle,
    Run(Box<SearchJob>),
    Exit,
}

struct WorkerShared {
    command: Mutex<Command>,
    wake: Condvar,
}

struct Worker {
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
}

/// The pool. Owns `threads - 1` helper workers; the main search runs on the
/// caller's thread.
pub struct ThreadPool {
    workers: Vec<Worker>,
}

impl ThreadPool {
    /// Pool for `threads` total search threads.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        let helper_count = threads.saturating_sub(1);
        let mut workers = Vec::with_capacity(helper_count);
        for id in 1..=helper_count {
            workers.push(Worker::spawn(id));
        }
        log::debug!("search pool: {} helper thread(s)", helper_count);
        ThreadPool { workers }
    }

    #[must_use]
    pub fn helper_count(&self) -> usize {
        self.workers.len()
    }

    fn kick(&self, mut jobs: Vec<SearchJob>) {
        debug_assert_eq!(jobs.len(), self.workers.len());
        for worker in self.workers.iter().rev() {
            let Some(job) = jobs.pop() else { break };
            let mut guard = worker.shared.command.lock();
            *guard = Command::Run(Box::new(job));
            worker.shared.wake.notify_one();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        for worker in &self.workers {
            let mut guard = worker.shared.command.lock();
            *guard = Command::Exit;
            worker.shared.wake.notify_one();
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Worker {
    fn spawn(id: usize) -> Self {
        let shared = Arc::new(WorkerShared {
            command: Mutex::new(Command::Idle),
            wake: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(format!("search-{id}"))
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || worker_loop(id, &thread_shared))
            .expect("failed to spawn search worker");
        Worker {
            shared,
            handle: Some(handle),
        }
    }
}

fn worker_loop(id: usize, shared: &WorkerShared) {
    // Ordering tables persist across searches on this thread.
    let mut state = SearchState::new();

    loop {
        let job = {
            let mut guard = shared.command.lock();
            loop {
                match std::mem::replace(&mut *guard, Command::Idle) {
                    Command::Run(job) => break job,
                    Command::Exit => return,
                    Command::Idle => shared.wake.wait(&mut guard),
                }
            }
        };

        let mut board = job.board.clone();
        state.contempt = job.contempt;
        state.set_game_history(&job.game_history);

        let result = search_root(
            &mut board,
            &mut state,
            &job.tt,
            job.evaluator.as_ref(),
            job.tb.as_ref(),
            &job.stop,
            &job.global_nodes,
            &job.limits,
            false,
            (id % 3) as i32,
            None,
        );

        job.results.submit(WorkerResult {
            best_move: result.best_move,
            score: result.score,
            depth: result.depth,
        });
    }
}

/// Run a search across the pool: helpers start first, the main search runs
/// on the calling thread, then everything joins on the stop flag.
#[allow(clippy::too_many_arguments)]
pub fn smp_search(
    pool: &ThreadPool,
    board: &mut Board,
    state: &mut SearchState,
    tt: &Arc<TranspositionTable>,
    evaluator: &Arc<dyn Evaluator>,
    tb: &Arc<dyn Tablebases>,
    stop: &Arc<AtomicBool>,
    limits: &SearchLimits,
    game_history: &[u64],
    callback: Option<InfoCallback>,
) -> SearchResult {
    tt.new_generation();
    let global_nodes = Arc::new(AtomicU64::new(0));
    let sink = Arc::new(ResultSink::new());

    let helper_count = pool.helper_count();
    if helper_count > 0 {
        let jobs: Vec<SearchJob> = (0..helper_count)
            .map(|_| SearchJob {
                board: board.clone(),
                limits: limits.clone(),
                tt: Arc::clone(tt),
                stop: Arc::clone(stop),
                global_nodes: Arc::clone(&global_nodes),
                game_history: game_history.to_vec(),
                contempt: state.contempt,
                evaluator: Arc::clone(evaluator),
                tb: Arc::clone(tb),
                results: Arc::clone(&sink),
            })
            .collect();
        pool.kick(jobs);
    }

    state.set_game_history(game_history);
    let main_result = search_root(
        board,
        state,
        tt,
        evaluator.as_ref(),
        tb.as_ref(),
        stop,
        &global_nodes,
        limits,
        true,
        0,
        callback,
    );

    // The main thread owns termination: everyone else stops with it.
    stop.store(true, std::sync::atomic::Ordering::Relaxed);

    if helper_count == 0 {
        return main_result;
    }
    let helper_results = sink.wait_for(helper_count);

    // The main thread's answer is authoritative unless a helper finished at
    // least as deep with a clearly better score.
    let mut best = main_result;
    for helper in helper_results {
        if let Some(mv) = helper.best_move {
            if helper.depth >= best.depth && helper.score > best.score + HELPER_OVERRIDE_MARGIN {
                best = SearchResult {
                    best_move: Some(mv),
                    ponder: None,
                    score: helper.score,
                    depth: helper.depth,
                };
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::MaterialEvaluator;
    use crate::tb::NoTablebases;

    #[test]
    fn test_pool_spawns_and_drops() {
        let pool = ThreadPool::new(4);
        assert_eq!(pool.helper_count(), 3);
        drop(pool);
    }

    #[test]
    fn test_single_thread_pool_has_no_helpers() {
        let pool = ThreadPool::new(1);
        assert_eq!(pool.helper_count(), 0);
    }

    #[test]
    fn test_smp_search_returns_move() {
        let pool = ThreadPool::new(2);
        let mut board = Board::startpos();
        let mut state = SearchState::new();
        let tt: Arc<TranspositionTable> = Arc::new(TranspositionTable::new(8));
        let evaluator: Arc<dyn Evaluator> = Arc::new(MaterialEvaluator);
        let tb: Arc<dyn Tablebases> = Arc::new(NoTablebases);
        let stop = Arc::new(AtomicBool::new(false));
        let history = vec![board.zobrist()];
        let limits = SearchLimits::depth(4);

        let result = smp_search(
            &pool,
            &mut board,
            &mut state,
            &tt,
            &evaluator,
            &tb,
            &stop,
            &limits,
            &history,
            None,
        );
        assert!(result.best_move.is_some());
        assert!(result.depth >= 1);
    }
}
