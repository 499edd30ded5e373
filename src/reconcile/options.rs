use crate::registry::CounterDef;

/// Per-call reconciliation options.
#[derive(Clone, Debug, Default)]
pub struct FixOptions {
    /// Only fix counters whose relation chain equals one of these.
    pub only: Option<Vec<Vec<String>>>,
    /// Never fix counters whose relation chain equals one of these.
    pub exclude: Vec<Vec<String>>,
    /// Skip counters that cannot be recomputed with joins instead of failing.
    pub skip_unsupported: bool,
    /// Overrides `EngineConfig::batch_size`.
    pub batch_size: Option<usize>,
    /// Overrides `EngineConfig::zero_fill`.
    pub zero_fill: Option<bool>,
}

impl FixOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn only<I, S>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only
            .get_or_insert_with(Vec::new)
            .push(chain.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude<I, S>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.push(chain.into_iter().map(Into::into).collect());
        self
    }

    pub fn skip_unsupported(mut self, skip: bool) -> Self {
        self.skip_unsupported = skip;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn zero_fill(mut self, zero_fill: bool) -> Self {
        self.zero_fill = Some(zero_fill);
        self
    }

    /// Whether `def` is selected by `only`/`exclude`.
    pub fn selects(&self, def: &CounterDef) -> bool {
        let chain = def.relation();
        if self.exclude.iter().any(|c| c.as_slice() == chain) {
            return false;
        }
        self.only
            .as_ref()
            .map_or(true, |only| only.iter().any(|c| c.as_slice() == chain))
    }
}
