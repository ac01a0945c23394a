//! Cooperative single-threaded task executor.
//!
//! Tasks never block on I/O. They suspend on clock edges or on other tasks
//! and are resumed by the simulation runner when that edge is delivered, so
//! the executor polls with a no-op waker and keeps its own wait lists.

use crate::device::{ClockEdge, Edge};
use crate::scheduler::Scheduler;
use crate::signal::{PortKind, SignalRef, SignalTable};
use crate::{HashMap, HashSet, SimulationError};
use num_bigint::BigUint;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

pub(crate) type TaskId = usize;
type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum WaitKey {
    Edge(ClockEdge),
    Join(TaskId),
}

/// State shared between the runner and every task.
#[derive(Default)]
pub(crate) struct Kernel {
    pub(crate) signals: SignalTable,
    pub(crate) scheduler: Scheduler,
    edge_counts: HashMap<ClockEdge, u64>,
    waiters: HashMap<WaitKey, Vec<TaskId>>,
    ready: VecDeque<TaskId>,
    queued: HashSet<TaskId>,
    spawned: Vec<(TaskId, LocalTask)>,
    next_task: TaskId,
    current: Option<TaskId>,
}

impl Kernel {
    fn edge_count(&self, edge: ClockEdge) -> u64 {
        self.edge_counts.get(&edge).copied().unwrap_or(0)
    }

    fn park(&mut self, key: WaitKey) {
        if let Some(id) = self.current {
            let waiting = self.waiters.entry(key).or_default();
            if !waiting.contains(&id) {
                waiting.push(id);
            }
        }
    }

    fn wake(&mut self, key: WaitKey) {
        if let Some(ids) = self.waiters.remove(&key) {
            for id in ids {
                self.schedule(id);
            }
        }
    }

    fn schedule(&mut self, id: TaskId) {
        if self.queued.insert(id) {
            self.ready.push_back(id);
        }
    }

    /// Records an edge and readies every task suspended on it.
    pub(crate) fn fire(&mut self, edge: ClockEdge) {
        *self.edge_counts.entry(edge).or_insert(0) += 1;
        self.wake(WaitKey::Edge(edge));
    }

    fn spawn_task(&mut self, task: LocalTask) -> TaskId {
        let id = self.next_task;
        self.next_task += 1;
        self.spawned.push((id, task));
        self.schedule(id);
        id
    }

    fn next_ready(&mut self) -> Option<TaskId> {
        let id = self.ready.pop_front()?;
        self.queued.remove(&id);
        Some(id)
    }

    /// Number of tasks that are suspended on something.
    pub(crate) fn parked_tasks(&self) -> usize {
        self.waiters.values().map(Vec::len).sum()
    }
}

/// Owns the task futures. Kept outside the [`Kernel`] so that a task can
/// borrow the kernel while it is being polled.
#[derive(Default)]
pub(crate) struct Executor {
    tasks: Vec<Option<LocalTask>>,
}

impl Executor {
    /// Polls ready tasks until every task is suspended again.
    pub(crate) fn run_ready(&mut self, kernel: &Rc<RefCell<Kernel>>) {
        let mut cx = Context::from_waker(Waker::noop());
        loop {
            let next = {
                let mut k = kernel.borrow_mut();
                for (id, task) in std::mem::take(&mut k.spawned) {
                    if id >= self.tasks.len() {
                        self.tasks.resize_with(id + 1, || None);
                    }
                    self.tasks[id] = Some(task);
                }
                k.next_ready()
            };
            let Some(id) = next else {
                break;
            };
            let Some(task) = self.tasks.get_mut(id).and_then(Option::as_mut) else {
                continue;
            };
            kernel.borrow_mut().current = Some(id);
            let poll = task.as_mut().poll(&mut cx);
            let mut k = kernel.borrow_mut();
            k.current = None;
            if poll.is_ready() {
                self.tasks[id] = None;
                k.wake(WaitKey::Join(id));
            }
        }
    }

    pub(crate) fn live_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_some()).count()
    }
}

/// Cloneable access to the running simulation from inside a task.
#[derive(Clone)]
pub struct SimHandle {
    pub(crate) kernel: Rc<RefCell<Kernel>>,
}

impl std::fmt::Debug for SimHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimHandle")
            .field("time", &self.time())
            .finish()
    }
}

impl SimHandle {
    pub(crate) fn new(kernel: Rc<RefCell<Kernel>>) -> Self {
        Self { kernel }
    }

    /// Current simulated time.
    pub fn time(&self) -> u64 {
        self.kernel.borrow().scheduler.time
    }

    pub fn signal(&self, name: &str) -> Result<SignalRef, SimulationError> {
        self.kernel.borrow().signals.resolve(name)
    }

    /// Resolves a clock port into an edge-wait capability.
    pub fn clock(&self, name: &str) -> Result<Clock, SimulationError> {
        let signal = self.signal(name)?;
        if self.kernel.borrow().signals.info(signal).kind != PortKind::Clock {
            return Err(SimulationError::NotAClock(name.to_string()));
        }
        Ok(Clock {
            handle: self.clone(),
            signal,
        })
    }

    pub fn get(&self, signal: SignalRef) -> BigUint {
        self.kernel.borrow().signals.get(signal).clone()
    }

    pub fn is_high(&self, signal: SignalRef) -> bool {
        self.kernel.borrow().signals.is_high(signal)
    }

    /// Drives a value; it is visible to the device at its next edge.
    pub fn set(&self, signal: SignalRef, value: impl Into<BigUint>) {
        self.kernel.borrow_mut().signals.set(signal, value.into());
    }

    pub fn set_bit(&self, signal: SignalRef, high: bool) {
        self.kernel.borrow_mut().signals.set_bit(signal, high);
    }

    /// Starts a concurrent task.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let slot = Rc::new(RefCell::new(None));
        let out = Rc::clone(&slot);
        let task = async move {
            let value = future.await;
            *out.borrow_mut() = Some(value);
        };
        let task = self.kernel.borrow_mut().spawn_task(Box::pin(task));
        JoinHandle {
            handle: self.clone(),
            task,
            slot,
        }
    }

    fn edge(&self, edge: ClockEdge) -> EdgeFuture {
        EdgeFuture {
            handle: self.clone(),
            edge,
            armed_at: None,
        }
    }
}

/// The only suspension capability a transaction driver needs: waiting for
/// edges of one clock.
#[derive(Clone, Debug)]
pub struct Clock {
    handle: SimHandle,
    signal: SignalRef,
}

impl Clock {
    pub fn signal(&self) -> SignalRef {
        self.signal
    }

    pub fn handle(&self) -> &SimHandle {
        &self.handle
    }

    pub fn rising_edge(&self) -> EdgeFuture {
        self.handle.edge(ClockEdge {
            clock: self.signal,
            edge: Edge::Rising,
        })
    }

    pub fn falling_edge(&self) -> EdgeFuture {
        self.handle.edge(ClockEdge {
            clock: self.signal,
            edge: Edge::Falling,
        })
    }

    /// Waits for `n` rising edges.
    pub async fn cycles(&self, n: usize) {
        for _ in 0..n {
            self.rising_edge().await;
        }
    }
}

/// Resolves at the first matching edge after its first poll.
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct EdgeFuture {
    handle: SimHandle,
    edge: ClockEdge,
    armed_at: Option<u64>,
}

impl Future for EdgeFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut kernel = this.handle.kernel.borrow_mut();
        let seen = kernel.edge_count(this.edge);
        match this.armed_at {
            Some(armed) if seen > armed => Poll::Ready(()),
            Some(_) => {
                kernel.park(WaitKey::Edge(this.edge));
                Poll::Pending
            }
            None => {
                this.armed_at = Some(seen);
                kernel.park(WaitKey::Edge(this.edge));
                Poll::Pending
            }
        }
    }
}

/// Completion of a spawned task.
#[must_use = "futures do nothing unless awaited"]
pub struct JoinHandle<T> {
    handle: SimHandle,
    task: TaskId,
    slot: Rc<RefCell<Option<T>>>,
}

impl<T> std::fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinHandle").field("task", &self.task).finish()
    }
}

impl<T> JoinHandle<T> {
    pub fn is_finished(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub(crate) fn try_take(&self) -> Option<T> {
        self.slot.borrow_mut().take()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        if let Some(value) = this.slot.borrow_mut().take() {
            return Poll::Ready(value);
        }
        this.handle
            .kernel
            .borrow_mut()
            .park(WaitKey::Join(this.task));
        Poll::Pending
    }
}
