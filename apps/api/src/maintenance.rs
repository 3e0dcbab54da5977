//! Periodic upkeep run with the service-role key: expiring appointments
//! nobody confirmed in time and finalizing doctor inactivations whose
//! reversal window has closed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use appointment_cell::services::AppointmentBookingService;
use doctor_cell::services::InactivationService;
use shared_config::AppConfig;

pub async fn run(config: Arc<AppConfig>) {
    let (Some(bookings), Some(inactivations)) = (
        AppointmentBookingService::for_maintenance(&config),
        InactivationService::for_maintenance(&config),
    ) else {
        error!("Maintenance loop needs SUPABASE_SERVICE_ROLE_KEY");
        return;
    };

    let mut ticker = interval(Duration::from_secs(config.maintenance_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Maintenance loop every {}s", config.maintenance_interval_secs);

    loop {
        ticker.tick().await;
        let now = Utc::now();
        debug!("Maintenance tick at {}", now);

        if let Err(e) = bookings.expire_overdue(now).await {
            error!("Appointment expiration failed: {}", e);
        }
        if let Err(e) = inactivations.finalize_expired(now).await {
            error!("Doctor inactivation sweep failed: {}", e);
        }
    }
}
