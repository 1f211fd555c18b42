use smol_str::SmolStr;

/// A pending block update. `delay` is relative to the moment of capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledBlockTick {
    pub block: SmolStr,
    pub priority: i32,
    pub delay: i64,
    pub tick_id: i64,
}

impl ScheduledBlockTick {
    pub fn new(block: impl Into<SmolStr>, priority: i32, delay: i64, tick_id: i64) -> Self {
        ScheduledBlockTick {
            block: block.into(),
            priority,
            delay,
            tick_id,
        }
    }
}
