//! Timed tasks on a virtual millisecond clock.
//!
//! The frame loop advances the clock; nothing here reads wall time, so timed
//! sequences can be tested by advancing the clock directly.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskToken(u64);

#[derive(Debug)]
struct Task<T> {
    token: TaskToken,
    deadline: f64,
    payload: T,
}

#[derive(Debug)]
pub struct TaskScheduler<T> {
    now: f64,
    next_token: u64,
    // kept in scheduling order; advance() sorts the due ones by deadline
    tasks: Vec<Task<T>>,
}

impl<T> TaskScheduler<T> {
    pub fn new() -> Self {
        Self { now: 0.0, next_token: 0, tasks: Vec::new() }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_pending(&self, token: TaskToken) -> bool {
        self.tasks.iter().any(|t| t.token == token)
    }

    /// Fires `payload` once the clock has advanced by `delay_ms`.
    pub fn schedule(&mut self, delay_ms: f64, payload: T) -> TaskToken {
        let token = TaskToken(self.next_token);
        self.next_token += 1;
        self.tasks.push(Task { token, deadline: self.now + delay_ms.max(0.0), payload });
        token
    }

    /// Returns false when the task already fired or was cancelled.
    pub fn cancel(&mut self, token: TaskToken) -> bool {
        match self.tasks.iter().position(|t| t.token == token) {
            Some(idx) => {
                self.tasks.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Advances the clock and returns the payloads that came due, earliest
    /// deadline first; equal deadlines keep scheduling order.
    pub fn advance(&mut self, dt_ms: f64) -> Vec<T> {
        self.now += dt_ms.max(0.0);
        let now = self.now;
        let (mut due, rest): (Vec<_>, Vec<_>) = self.tasks.drain(..).partition(|t| t.deadline <= now);
        self.tasks = rest;
        // stable sort keeps scheduling order among ties
        due.sort_by(|a, b| a.deadline.total_cmp(&b.deadline));
        due.into_iter().map(|t| t.payload).collect()
    }
}

impl<T> Default for TaskScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
