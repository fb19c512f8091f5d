//! Staging several actions into one atom

use super::actions::UserAction;
use super::mappers::map_action;
use crate::atom::UnsignedAtom;
use crate::error::StageActionError;
use crate::particles::{Particle, ParticleGroup, Spin};
use crate::primitives::RadixAddress;
use tracing::debug;

/// Each staged action sees the up particles left by the ones before it.
pub struct TransactionBuilder {
    active: RadixAddress,
    up_particles: Vec<Particle>,
    groups: Vec<ParticleGroup>,
    message: Option<String>,
}

impl TransactionBuilder {
    pub fn new(active: RadixAddress, up_particles: Vec<Particle>) -> Self {
        TransactionBuilder {
            active,
            up_particles,
            groups: Vec::new(),
            message: None,
        }
    }

    /// Free-form atom metadata shown alongside the transaction.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn stage(&mut self, action: &UserAction) -> Result<&mut Self, StageActionError> {
        let groups = map_action(action, &self.up_particles, &self.active)?;
        for group in &groups {
            for spun in group.particles() {
                match spun.spin {
                    Spin::Up => self.up_particles.push(spun.particle.clone()),
                    Spin::Down => {
                        if let Some(index) = self.up_particles.iter().position(|p| p == &spun.particle) {
                            self.up_particles.remove(index);
                        }
                    }
                    Spin::Neutral => {}
                }
            }
        }
        debug!(action = action.name(), groups = groups.len(), "Action staged");
        self.groups.extend(groups);
        Ok(self)
    }

    pub fn stage_all<'a>(
        &mut self,
        actions: impl IntoIterator<Item = &'a UserAction>,
    ) -> Result<&mut Self, StageActionError> {
        for action in actions {
            self.stage(action)?;
        }
        Ok(self)
    }

    /// Up particles as they stand after everything staged so far.
    pub fn up_particles(&self) -> &[Particle] {
        &self.up_particles
    }

    pub fn groups(&self) -> &[ParticleGroup] {
        &self.groups
    }

    pub fn build(self, timestamp_ms: i64) -> UnsignedAtom {
        let atom = UnsignedAtom::new(self.groups, timestamp_ms);
        match self.message {
            Some(message) => atom.with_metadata("message", message),
            None => atom,
        }
    }

    pub fn build_now(self) -> UnsignedAtom {
        self.build(chrono::Utc::now().timestamp_millis())
    }
}
