//! Shape of the optional pin-control collaborator used for reset
//! recovery. The driver never owns the pins; a board support layer
//! implements this trait over whatever GPIO access it has.

use std::io;
use std::time::Duration;

/// Control over the module's reset line and one general-purpose output.
///
/// The reset line is open-drain and active-low: asserting drives it low,
/// releasing returns it to high-impedance input.
pub trait ResetControl {
    fn assert_reset(&mut self) -> io::Result<()>;
    fn release_reset(&mut self) -> io::Result<()>;
    fn set_output(&mut self, high: bool) -> io::Result<()>;
}

/// Holds the reset line low for `pulse`, then releases it.
pub async fn pulse_reset<C>(control: &mut C, pulse: Duration) -> io::Result<()>
where
    C: ResetControl + ?Sized,
{
    control.assert_reset()?;
    tokio::time::sleep(pulse).await;
    control.release_reset()
}
