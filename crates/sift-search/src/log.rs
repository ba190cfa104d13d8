use sift_query::CompiledRequest;

/// Requests recorded before they are sent, while enabled.
#[derive(Debug, Default)]
pub struct QueryLog {
    enabled: bool,
    entries: Vec<CompiledRequest>,
}

impl QueryLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn record(&mut self, request: &CompiledRequest) {
        if self.enabled {
            self.entries.push(request.clone());
        }
    }

    pub fn entries(&self) -> &[CompiledRequest] {
        &self.entries
    }

    pub fn last(&self) -> Option<&CompiledRequest> {
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
