//! Analyzer phases a channel goes through, and the bitmask that tracks them

use std::fmt;

/// A named stage of channel processing
///
/// Request phases occupy the low 16 bits of an [`AnalyzerMask`], response
/// phases the high ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzerPhase {
    ReqInspectFrontend,
    ReqWaitHttp,
    ReqHttpBody,
    ReqHttpProcessFrontend,
    ReqSwitchingRules,
    ReqInspectBackend,
    ReqHttpProcessBackend,
    ReqServerRules,
    ReqHttpInner,
    ReqHttpTarpit,
    ReqStickingRules,
    ReqPersistRdpCookie,
    ReqHttpXferBody,
    ResInspect,
    ResWaitHttp,
    ResHttpProcess,
    ResStoreRules,
    ResHttpXferBody,
}

impl AnalyzerPhase {
    pub const REQUEST: [AnalyzerPhase; 13] = [
        AnalyzerPhase::ReqInspectFrontend,
        AnalyzerPhase::ReqWaitHttp,
        AnalyzerPhase::ReqHttpBody,
        AnalyzerPhase::ReqHttpProcessFrontend,
        AnalyzerPhase::ReqSwitchingRules,
        AnalyzerPhase::ReqInspectBackend,
        AnalyzerPhase::ReqHttpProcessBackend,
        AnalyzerPhase::ReqServerRules,
        AnalyzerPhase::ReqHttpInner,
        AnalyzerPhase::ReqHttpTarpit,
        AnalyzerPhase::ReqStickingRules,
        AnalyzerPhase::ReqPersistRdpCookie,
        AnalyzerPhase::ReqHttpXferBody,
    ];

    pub const RESPONSE: [AnalyzerPhase; 5] = [
        AnalyzerPhase::ResInspect,
        AnalyzerPhase::ResWaitHttp,
        AnalyzerPhase::ResHttpProcess,
        AnalyzerPhase::ResStoreRules,
        AnalyzerPhase::ResHttpXferBody,
    ];

    /// The bit this phase occupies in an [`AnalyzerMask`]
    pub fn bit(self) -> u32 {
        match self {
            AnalyzerPhase::ReqInspectFrontend => 0x0000_0001,
            AnalyzerPhase::ReqWaitHttp => 0x0000_0002,
            AnalyzerPhase::ReqHttpBody => 0x0000_0004,
            AnalyzerPhase::ReqHttpProcessFrontend => 0x0000_0008,
            AnalyzerPhase::ReqSwitchingRules => 0x0000_0010,
            AnalyzerPhase::ReqInspectBackend => 0x0000_0020,
            AnalyzerPhase::ReqHttpProcessBackend => 0x0000_0040,
            AnalyzerPhase::ReqServerRules => 0x0000_0080,
            AnalyzerPhase::ReqHttpInner => 0x0000_0100,
            AnalyzerPhase::ReqHttpTarpit => 0x0000_0200,
            AnalyzerPhase::ReqStickingRules => 0x0000_0400,
            AnalyzerPhase::ReqPersistRdpCookie => 0x0000_0800,
            AnalyzerPhase::ReqHttpXferBody => 0x0000_1000,
            AnalyzerPhase::ResInspect => 0x0001_0000,
            AnalyzerPhase::ResWaitHttp => 0x0002_0000,
            AnalyzerPhase::ResHttpProcess => 0x0004_0000,
            AnalyzerPhase::ResStoreRules => 0x0008_0000,
            AnalyzerPhase::ResHttpXferBody => 0x0010_0000,
        }
    }

    /// Look a phase up by its bit, `None` for unknown or combined bits
    pub fn from_bit(bit: u32) -> Option<Self> {
        Self::REQUEST.iter().chain(Self::RESPONSE.iter()).copied().find(|phase| phase.bit() == bit)
    }

    /// Label used in trace lines
    pub fn label(self) -> &'static str {
        match self {
            AnalyzerPhase::ReqInspectFrontend => "REQ_INSPECT_FE",
            AnalyzerPhase::ReqWaitHttp => "REQ_WAIT_HTTP",
            AnalyzerPhase::ReqHttpBody => "REQ_HTTP_BODY",
            AnalyzerPhase::ReqHttpProcessFrontend => "REQ_HTTP_PROCESS_FE",
            AnalyzerPhase::ReqSwitchingRules => "REQ_SWITCHING_RULES",
            AnalyzerPhase::ReqInspectBackend => "REQ_INSPECT_BE",
            AnalyzerPhase::ReqHttpProcessBackend => "REQ_HTTP_PROCESS_BE",
            AnalyzerPhase::ReqServerRules => "REQ_SRV_RULES",
            AnalyzerPhase::ReqHttpInner => "REQ_HTTP_INNER",
            AnalyzerPhase::ReqHttpTarpit => "REQ_HTTP_TARPIT",
            AnalyzerPhase::ReqStickingRules => "REQ_STICKING_RULES",
            AnalyzerPhase::ReqPersistRdpCookie => "REQ_PRST_RDP_COOKIE",
            AnalyzerPhase::ReqHttpXferBody => "REQ_HTTP_XFER_BODY",
            AnalyzerPhase::ResInspect => "RES_INSPECT",
            AnalyzerPhase::ResWaitHttp => "RES_WAIT_HTTP",
            AnalyzerPhase::ResHttpProcess => "RES_HTTP_PROCESS_FE/BE",
            AnalyzerPhase::ResStoreRules => "RES_STORE_RULES",
            AnalyzerPhase::ResHttpXferBody => "RES_HTTP_XFER_BODY",
        }
    }
}

impl fmt::Display for AnalyzerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Set of analyzer phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AnalyzerMask(u32);

impl AnalyzerMask {
    pub const NONE: AnalyzerMask = AnalyzerMask(0);
    pub const REQ_ALL: AnalyzerMask = AnalyzerMask(0x0000_1fff);
    pub const RES_ALL: AnalyzerMask = AnalyzerMask(0x001f_0000);
    pub const ALL: AnalyzerMask = AnalyzerMask(0x001f_1fff);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, phase: AnalyzerPhase) -> bool {
        self.0 & phase.bit() != 0
    }

    pub fn insert(&mut self, phase: AnalyzerPhase) {
        self.0 |= phase.bit();
    }

    pub fn remove(&mut self, phase: AnalyzerPhase) {
        self.0 &= !phase.bit();
    }

    pub fn union(self, other: AnalyzerMask) -> AnalyzerMask {
        AnalyzerMask(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<AnalyzerPhase> for AnalyzerMask {
    fn from_iter<I: IntoIterator<Item = AnalyzerPhase>>(iter: I) -> Self {
        let mut mask = AnalyzerMask::NONE;
        for phase in iter {
            mask.insert(phase);
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_masks_cover_every_phase() {
        let req: AnalyzerMask = AnalyzerPhase::REQUEST.into_iter().collect();
        let res: AnalyzerMask = AnalyzerPhase::RESPONSE.into_iter().collect();
        assert_eq!(req, AnalyzerMask::REQ_ALL);
        assert_eq!(res, AnalyzerMask::RES_ALL);
        assert_eq!(req.union(res), AnalyzerMask::ALL);
    }

    #[test]
    fn test_from_bit() {
        assert_eq!(AnalyzerPhase::from_bit(0x0000_0002), Some(AnalyzerPhase::ReqWaitHttp));
        assert_eq!(AnalyzerPhase::from_bit(0x0010_0000), Some(AnalyzerPhase::ResHttpXferBody));
        assert_eq!(AnalyzerPhase::from_bit(0x3), None);
        assert_eq!(AnalyzerPhase::from_bit(0), None);
    }

    #[test]
    fn test_insert_remove() {
        let mut mask = AnalyzerMask::NONE;
        mask.insert(AnalyzerPhase::ResInspect);
        assert!(mask.contains(AnalyzerPhase::ResInspect));
        assert!(!mask.contains(AnalyzerPhase::ReqInspectFrontend));
        mask.remove(AnalyzerPhase::ResInspect);
        assert!(mask.is_empty());
    }
}
