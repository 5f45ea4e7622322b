//! Circuit purposes for the service side of the hidden-service protocol
//! (§4.2). Client-side purposes are a Non-goal; see the crate's docs.

use relay_core::id::ExtendInfo;

/// The lifecycle a circuit moves through on the service side.
///
/// Transitions only ever happen through the `Circuit` methods below, never
/// by assigning a new variant directly — each transition asserts the prior
/// purpose, the same discipline the teacher's scheduler state machine uses
/// for its own tagged union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purpose {
    /// Building toward an intro point, ESTABLISH_INTRO not yet acked.
    EstablishIntro,
    /// ESTABLISH_INTRO acked; this circuit is a live intro point.
    Intro,
    /// Built toward a rendezvous point named by an INTRODUCE2 cell.
    ConnectRend {
        cookie: [u8; 20],
        attempts: u8,
        expiry: u64,
    },
    /// RENDEZVOUS2 received; the rendezvous is joined.
    RendJoined,
}

impl Purpose {
    pub fn is_establish_intro(&self) -> bool {
        matches!(self, Purpose::EstablishIntro)
    }

    pub fn is_intro(&self) -> bool {
        matches!(self, Purpose::Intro)
    }

    pub fn is_connect_rend(&self) -> bool {
        matches!(self, Purpose::ConnectRend { .. })
    }

    pub fn is_rend_joined(&self) -> bool {
        matches!(self, Purpose::RendJoined)
    }
}

/// A circuit as tracked by the service engine: its purpose plus the
/// bookkeeping shared across all purposes (target relay, timestamps).
#[derive(Debug, Clone)]
pub struct Circuit {
    pub id: u64,
    pub purpose: Purpose,
    pub target: ExtendInfo,
    pub launched_at: u64,
    /// Derived handshake keying material once a rendezvous DH exchange has
    /// completed. Kept outside `Purpose::ConnectRend` because that variant's
    /// fields mirror the protocol's own cookie/attempts/expiry triple
    /// exactly; this is engine-local state layered on top.
    pub handshake_material: Option<Vec<u8>>,
}

impl Circuit {
    /// A freshly launched circuit toward an intro point candidate.
    pub fn establish_intro(id: u64, target: ExtendInfo, now: u64) -> Circuit {
        Circuit {
            id,
            purpose: Purpose::EstablishIntro,
            target,
            launched_at: now,
            handshake_material: None,
        }
    }

    /// ESTABLISH_INTRO acked: `EstablishIntro` -> `Intro`.
    pub fn mark_intro_established(&mut self) {
        assert!(self.purpose.is_establish_intro(), "mark_intro_established: wrong prior purpose");
        self.purpose = Purpose::Intro;
    }

    /// A freshly launched circuit toward a rendezvous point named by an
    /// INTRODUCE2 cell.
    pub fn connect_rend(id: u64, target: ExtendInfo, cookie: [u8; 20], expiry: u64, now: u64) -> Circuit {
        Circuit {
            id,
            purpose: Purpose::ConnectRend { cookie, attempts: 0, expiry },
            target,
            launched_at: now,
            handshake_material: None,
        }
    }

    /// Record a failed build attempt on a `ConnectRend` circuit, bumping
    /// `attempts` in place.
    pub fn note_rend_attempt_failed(&mut self) {
        match &mut self.purpose {
            Purpose::ConnectRend { attempts, .. } => *attempts += 1,
            _ => panic!("note_rend_attempt_failed: wrong prior purpose"),
        }
    }

    /// RENDEZVOUS2 received: `ConnectRend` -> `RendJoined`.
    pub fn mark_rend_joined(&mut self, handshake_material: Vec<u8>) {
        assert!(self.purpose.is_connect_rend(), "mark_rend_joined: wrong prior purpose");
        self.purpose = Purpose::RendJoined;
        self.handshake_material = Some(handshake_material);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::id::RouterId;
    use std::net::{IpAddr, Ipv4Addr};

    fn sample_target() -> ExtendInfo {
        ExtendInfo {
            nickname: "relay1".into(),
            id: RouterId([7; 20]),
            addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            port: 9001,
            onion_key_der: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_establish_intro_to_intro() {
        let mut c = Circuit::establish_intro(1, sample_target(), 0);
        assert!(c.purpose.is_establish_intro());
        c.mark_intro_established();
        assert!(c.purpose.is_intro());
    }

    #[test]
    #[should_panic(expected = "wrong prior purpose")]
    fn test_mark_intro_established_rejects_wrong_purpose() {
        let mut c = Circuit::establish_intro(1, sample_target(), 0);
        c.mark_intro_established();
        c.mark_intro_established();
    }

    #[test]
    fn test_connect_rend_to_rend_joined() {
        let mut c = Circuit::connect_rend(2, sample_target(), [9u8; 20], 600, 0);
        assert!(c.purpose.is_connect_rend());
        c.note_rend_attempt_failed();
        match c.purpose {
            Purpose::ConnectRend { attempts, .. } => assert_eq!(attempts, 1),
            _ => panic!("expected ConnectRend"),
        }
        c.mark_rend_joined(vec![0xAA; 4]);
        assert!(c.purpose.is_rend_joined());
        assert_eq!(c.handshake_material, Some(vec![0xAA; 4]));
    }
}
