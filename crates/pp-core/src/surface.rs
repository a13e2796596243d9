//! Collaborators the controller drives but never reads from.
//!
//! Every method defaults to a no-op so a host only implements what it renders.
//! A [`SurfaceError`] is logged by the controller; persisted state is never
//! rolled back because a reflection failed.

use crate::error::SurfaceError;
use pp_types::ModeSnapshot;

pub type SurfaceResult = Result<(), SurfaceError>;

pub trait Surface {
    fn show_message(&mut self, _message: &str) -> SurfaceResult {
        Ok(())
    }

    fn open_exercise_picker(&mut self, _default_minutes: u32) -> SurfaceResult {
        Ok(())
    }

    fn close_exercise_picker(&mut self) -> SurfaceResult {
        Ok(())
    }

    /// Puts both toggle controls in line with the settled mode.
    fn reflect_switches(&mut self, _auto_mode: bool, _exercise_mode: bool) -> SurfaceResult {
        Ok(())
    }

    /// CGMS and pump status labels.
    fn refresh_device_status(&mut self, _cgms_paired: bool, _pump_paired: bool) -> SurfaceResult {
        Ok(())
    }

    fn refresh_final_status(&mut self, _snapshot: &ModeSnapshot) -> SurfaceResult {
        Ok(())
    }
}
