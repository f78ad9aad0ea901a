/*!
 * Post-Execute Policies
 * Decide when the synchronous scheduler runs its maintenance process
 */

/// State seen by a policy after each completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostExecuteContext {
    /// Tasks still waiting in the queue
    pub queued: usize,
    /// Runs completed since the scheduler started
    pub completed: u64,
}

#[cfg_attr(test, mockall::automock)]
pub trait PostExecutePolicy: Send {
    /// Called after every run; true fires the maintenance process
    fn do_event(&mut self, ctx: &PostExecuteContext) -> bool;

    /// Called after the maintenance process ran
    fn reset(&mut self) {}
}

/// Fires once the queue has drained
#[derive(Debug, Clone, Copy, Default)]
pub struct OnQueueEmpty;

impl PostExecutePolicy for OnQueueEmpty {
    fn do_event(&mut self, ctx: &PostExecuteContext) -> bool {
        ctx.queued == 0
    }
}

/// Fires every `max` completed runs; never when `max` is 0
#[derive(Debug, Clone, Copy, Default)]
pub struct OnCount {
    max: u32,
    count: u32,
}

impl OnCount {
    pub fn new(max: u32) -> Self {
        Self { max, count: 0 }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl PostExecutePolicy for OnCount {
    fn do_event(&mut self, _ctx: &PostExecuteContext) -> bool {
        self.count = self.count.saturating_add(1);
        self.max > 0 && self.count >= self.max
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}
