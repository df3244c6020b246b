use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Transition table for appointment statuses.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;

        match current {
            Disponible => &[Reservada, Cancelada],
            Reservada => &[Confirmada, Completada, Cancelada],
            // Re-confirming is allowed so a second click on the e-mail link is harmless.
            Confirmada => &[Confirmada, Completada, Cancelada],
            Completada | Cancelada => &[],
        }
    }

    pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
        Self::valid_transitions(from).contains(&to)
    }

    pub fn validate(
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("validating status transition {} -> {}", from, to);

        if !Self::can_transition(from, to) {
            warn!("invalid status transition attempted: {} -> {}", from, to);
            return Err(AppointmentError::InvalidStatusTransition { from, to });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use AppointmentStatus::*;

    #[test]
    fn available_slots_can_only_be_reserved_or_withdrawn() {
        assert!(AppointmentLifecycle::can_transition(Disponible, Reservada));
        assert!(AppointmentLifecycle::can_transition(Disponible, Cancelada));
        assert!(!AppointmentLifecycle::can_transition(Disponible, Confirmada));
        assert!(!AppointmentLifecycle::can_transition(Disponible, Completada));
    }

    #[test]
    fn confirmation_is_idempotent() {
        assert!(AppointmentLifecycle::can_transition(Reservada, Confirmada));
        assert!(AppointmentLifecycle::can_transition(Confirmada, Confirmada));
        assert!(!AppointmentLifecycle::can_transition(Reservada, Reservada));
    }

    #[test]
    fn terminal_states_are_final() {
        for to in AppointmentStatus::ALL {
            assert!(!AppointmentLifecycle::can_transition(Completada, to));
            assert!(!AppointmentLifecycle::can_transition(Cancelada, to));
        }
        assert_matches!(
            AppointmentLifecycle::validate(Cancelada, Reservada),
            Err(AppointmentError::InvalidStatusTransition { from: Cancelada, to: Reservada })
        );
    }
}
