// SPDX-License-Identifier: MIT

//! Cooperative task scheduler.
//!
//! A fixed-capacity table of plain functions, each with a period and an
//! enable flag, driven from the main loop. Tasks run synchronously to
//! completion, one at a time, in registration order when due at the same
//! instant - there is no preemption, which is what keeps the single-writer
//! motor ownership sound.
//!
//! The hardware watchdog is fed on every `run` call and again around each
//! task invocation, so a task that overruns its budget is the only thing
//! that can starve it.

use heapless::Vec;

use crate::hal::Watchdog;

pub const MAX_TASKS: usize = 8;

/// Task body: shared context plus the tick timestamp.
pub type TaskFn<C> = fn(&mut C, u32);

struct Task<C> {
    func: TaskFn<C>,
    interval_ms: u32,
    last_run: u32,
    enabled: bool,
    name: &'static str,
}

/// The task table is full; registration is refused, not fatal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskTableFull;

pub struct Scheduler<C> {
    tasks: Vec<Task<C>, MAX_TASKS>,
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Add a task; returns its index for enable/disable control.
    pub fn register(
        &mut self,
        func: TaskFn<C>,
        interval_ms: u32,
        name: &'static str,
    ) -> Result<usize, TaskTableFull> {
        let index = self.tasks.len();
        self.tasks
            .push(Task {
                func,
                interval_ms,
                last_run: 0,
                enabled: true,
                name,
            })
            .map_err(|_| TaskTableFull)?;
        Ok(index)
    }

    pub fn enable(&mut self, index: usize) {
        if let Some(task) = self.tasks.get_mut(index) {
            task.enabled = true;
        }
    }

    pub fn disable(&mut self, index: usize) {
        if let Some(task) = self.tasks.get_mut(index) {
            task.enabled = false;
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_name(&self, index: usize) -> Option<&'static str> {
        self.tasks.get(index).map(|t| t.name)
    }

    /// Run every enabled task whose period has elapsed. Call continuously
    /// from the main loop.
    pub fn run(&mut self, now: u32, ctx: &mut C, dog: &mut impl Watchdog) {
        dog.feed();

        for task in self.tasks.iter_mut() {
            if !task.enabled {
                continue;
            }
            if now.wrapping_sub(task.last_run) >= task.interval_ms {
                dog.feed();
                (task.func)(ctx, now);
                task.last_run = now;
                dog.feed();
            }
        }
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}
