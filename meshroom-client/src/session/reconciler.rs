use crate::session::link_table::PeerLinkTable;
use meshroom_core::PeerId;
use std::collections::BTreeSet;
use std::time::Duration;

/// Room-wide pause on originating offers after a negotiation failure.
/// Each engagement bumps the generation, so only the timer armed by the
/// most recent failure can clear it.
#[derive(Debug)]
pub struct Cooldown {
    window: Duration,
    active: bool,
    generation: u64,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            active: false,
            generation: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Starts (or restarts) the window; returns the generation to arm a timer for.
    pub fn engage(&mut self) -> u64 {
        self.generation += 1;
        self.active = true;
        self.generation
    }

    /// Clears the cooldown if `generation` is the latest one.
    pub fn elapse(&mut self, generation: u64) -> bool {
        if self.active && generation == self.generation {
            self.active = false;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.generation += 1;
    }
}

/// Keeps the roster snapshot, the set of peers whose offer was deferred,
/// and the cooldown.
#[derive(Debug)]
pub struct Reconciler {
    local_id: PeerId,
    roster: BTreeSet<PeerId>,
    pending: BTreeSet<PeerId>,
    cooldown: Cooldown,
}

impl Reconciler {
    pub fn new(local_id: PeerId, cooldown: Duration) -> Self {
        Self {
            local_id,
            roster: BTreeSet::new(),
            pending: BTreeSet::new(),
            cooldown: Cooldown::new(cooldown),
        }
    }

    /// Replaces the roster wholesale. Self is dropped and pending entries
    /// for peers that left are forgotten. Returns the peers that left.
    pub fn replace_roster(&mut self, peers: impl IntoIterator<Item = PeerId>) -> Vec<PeerId> {
        let local_id = self.local_id;
        let roster: BTreeSet<PeerId> = peers.into_iter().filter(|p| *p != local_id).collect();
        let departed = self.roster.difference(&roster).copied().collect();
        self.roster = roster;
        let roster = &self.roster;
        self.pending.retain(|p| roster.contains(p));
        departed
    }

    pub fn roster(&self) -> &BTreeSet<PeerId> {
        &self.roster
    }

    /// Roster peers with neither a link nor a pending record.
    pub fn unlinked(&self, links: &PeerLinkTable) -> Vec<PeerId> {
        self.roster
            .iter()
            .filter(|p| !links.contains(p) && !self.pending.contains(p))
            .copied()
            .collect()
    }

    pub fn defer(&mut self, peer: PeerId) -> bool {
        self.pending.insert(peer)
    }

    pub fn resolve(&mut self, peer: &PeerId) -> bool {
        self.pending.remove(peer)
    }

    pub fn is_pending(&self, peer: &PeerId) -> bool {
        self.pending.contains(peer)
    }

    pub fn pending(&self) -> &BTreeSet<PeerId> {
        &self.pending
    }

    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    pub fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }

    pub fn cooling_down(&self) -> bool {
        self.cooldown.is_active()
    }

    pub fn reset(&mut self) {
        self.roster.clear();
        self.pending.clear();
        self.cooldown.reset();
    }
}
