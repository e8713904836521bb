use folio_types::HisItem;

/// Called once a history write has been persisted and the host record's
/// summary tags (`hisSize`, `hisStart(+Val)`, `hisEnd(+Val)`) refreshed.
pub trait PostHisWriteHook: Send + Sync {
    fn on_post_his_write(&self, id: &str, item: &HisItem) {
        let _ = (id, item);
    }
}

impl PostHisWriteHook for () {}
