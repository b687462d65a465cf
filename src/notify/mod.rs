//! # Notification Module
//!
//! Email alerts for fleet findings that need an operator.
//!
//! Two alerts exist, each sent only when its counter is non-zero:
//! - FET failures (every `FetFail` finding, one per line)
//! - Module off with Ref=78
//!
//! Delivery goes through the [`Notifier`] trait so the dispatch rules can be
//! tested without an SMTP server.

pub mod smtp;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::Result;
use crate::report::FleetAggregate;

pub use smtp::SmtpNotifier;

/// Outbound alert channel
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// Where the alerts come from, for subject lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertContext {
    pub site: String,
    pub file_name: String,
}

impl AlertContext {
    fn subject_suffix(&self) -> String {
        format!("site {} file {}", self.site, self.file_name)
    }

    pub fn fet_subject(&self) -> String {
        format!("List of FET failures for the {}", self.subject_suffix())
    }

    pub fn module_off_subject(&self) -> String {
        format!("List of Module Off units for the {}", self.subject_suffix())
    }
}

/// Send the alerts the aggregate calls for
///
/// Both alerts are attempted even if the first fails.
///
/// # Returns
///
/// Number of alerts delivered
///
/// # Errors
///
/// Returns the first delivery error after attempting every alert.
pub async fn dispatch_alerts(
    aggregate: &FleetAggregate,
    notifier: &dyn Notifier,
    context: &AlertContext,
) -> Result<usize> {
    let mut alerts = Vec::new();
    if aggregate.fet_failures != 0 {
        info!("Sending email alert about FET failures...");
        alerts.push((context.fet_subject(), aggregate.fet_alert_body()));
    }
    if aggregate.module_off != 0 {
        info!("Sending email alert about units with Module OFF and Vref=78...");
        alerts.push((context.module_off_subject(), aggregate.module_off_alert_body()));
    }

    let mut sent = 0;
    let mut first_error = None;
    for (subject, body) in alerts {
        match notifier.send(&subject, &body).await {
            Ok(()) => sent += 1,
            Err(e) => {
                error!("Failed to send \"{}\": {}", subject, e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(sent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;

    fn context() -> AlertContext {
        AlertContext {
            site: "canadian_solar".to_string(),
            file_name: "20171105_b302.csv".to_string(),
        }
    }

    fn aggregate(fet_failures: usize, module_off: usize) -> FleetAggregate {
        FleetAggregate {
            fet_failures,
            module_off,
            fet_messages: (0..fet_failures).map(|i| format!("fet {}", i)).collect(),
            module_off_messages: (0..module_off).map(|i| format!("off {}", i)).collect(),
            ..FleetAggregate::default()
        }
    }

    #[test]
    fn test_subjects() {
        let ctx = context();
        assert_eq!(
            ctx.fet_subject(),
            "List of FET failures for the site canadian_solar file 20171105_b302.csv"
        );
        assert_eq!(
            ctx.module_off_subject(),
            "List of Module Off units for the site canadian_solar file 20171105_b302.csv"
        );
    }

    #[tokio::test]
    async fn test_no_alerts_for_clean_fleet() {
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let sent = dispatch_alerts(&aggregate(0, 0), &notifier, &context())
            .await
            .unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_fet_alert_only() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|subject, body| subject.starts_with("List of FET failures") && body == "fet 0\nfet 1")
            .times(1)
            .returning(|_, _| Ok(()));

        let sent = dispatch_alerts(&aggregate(2, 0), &notifier, &context())
            .await
            .unwrap();
        assert_eq!(sent, 1);
    }

    #[tokio::test]
    async fn test_both_alerts() {
        let mut notifier = MockNotifier::new();
        let mut seq = mockall::Sequence::new();
        notifier
            .expect_send()
            .withf(|subject, _| subject.starts_with("List of FET failures"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        notifier
            .expect_send()
            .withf(|subject, body| subject.starts_with("List of Module Off units") && body == "off 0")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let sent = dispatch_alerts(&aggregate(1, 1), &notifier, &context())
            .await
            .unwrap();
        assert_eq!(sent, 2);
    }

    #[test]
    fn test_failed_delivery_still_tries_second_alert() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|subject, _| subject.starts_with("List of FET failures"))
            .times(1)
            .returning(|_, _| Err(ScanError::Notify("relay refused".to_string())));
        notifier
            .expect_send()
            .withf(|subject, _| subject.starts_with("List of Module Off units"))
            .times(1)
            .returning(|_, _| Ok(()));

        let result = tokio_test::block_on(dispatch_alerts(&aggregate(1, 1), &notifier, &context()));
        match result {
            Err(ScanError::Notify(msg)) => assert_eq!(msg, "relay refused"),
            other => panic!("Expected Notify error, got: {:?}", other),
        }
    }
}
