//! Order confirmation email.
//!
//! Delivery is best-effort. [`NotificationDispatcher`] catches and logs every
//! failure so a paid order never depends on the mail server being up.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use streetmerch_core::{Email, Money};

use crate::config::EmailConfig;
use crate::db::{CustomerRepository, Repositories};
use crate::models::{Customer, Order};

/// Errors that can occur when sending a confirmation.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Structured data for one confirmation email.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub recipient: Email,
    pub customer_name: Option<String>,
    pub order: Order,
}

impl OrderConfirmation {
    #[must_use]
    pub fn subject(&self) -> String {
        format!("Order #{} confirmed", self.order.short_id())
    }

    /// Render the plain text and HTML bodies.
    ///
    /// # Errors
    ///
    /// Returns `askama::Error` if a template fails to render.
    pub fn render(&self) -> Result<(String, String), askama::Error> {
        let view = ConfirmationView::new(self);
        let text = OrderConfirmationText { view: &view }.render()?;
        let html = OrderConfirmationHtml { view: &view }.render()?;
        Ok((text, html))
    }
}

struct LineView {
    name: String,
    variant: String,
    quantity: u32,
    line_total: String,
}

struct ConfirmationView {
    short_id: String,
    customer_name: String,
    provider: &'static str,
    lines: Vec<LineView>,
    total: String,
    shipping_to: String,
}

impl ConfirmationView {
    fn new(confirmation: &OrderConfirmation) -> Self {
        let order = &confirmation.order;
        let money = |amount| Money::new(amount, order.currency).display();
        Self {
            short_id: order.short_id(),
            customer_name: confirmation
                .customer_name
                .clone()
                .unwrap_or_else(|| "there".to_owned()),
            provider: order
                .provider()
                .map_or("card", |p| p.display_name()),
            lines: order
                .lines
                .iter()
                .map(|line| LineView {
                    name: line.name.clone(),
                    variant: line.variant.clone().unwrap_or_default(),
                    quantity: line.quantity,
                    line_total: money(line.line_total()),
                })
                .collect(),
            total: order.total_money().display(),
            shipping_to: order
                .shipping_address
                .as_ref()
                .map(|a| format!("{}, {} {}", a.name, a.city, a.country))
                .unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    view: &'a ConfirmationView,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    view: &'a ConfirmationView,
}

impl std::ops::Deref for OrderConfirmationHtml<'_> {
    type Target = ConfirmationView;

    fn deref(&self) -> &Self::Target {
        self.view
    }
}

impl std::ops::Deref for OrderConfirmationText<'_> {
    type Target = ConfirmationView;

    fn deref(&self) -> &Self::Target {
        self.view
    }
}

/// Sends order confirmations.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotificationError>;
}

/// SMTP delivery via lettre.
#[derive(Clone)]
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    /// Create a notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured or the sender address
    /// does not parse.
    pub fn new(config: &EmailConfig) -> Result<Self, NotificationError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        let from = config
            .from_address
            .parse()
            .map_err(|_| NotificationError::InvalidAddress(config.from_address.clone()))?;

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl OrderNotifier for EmailNotifier {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotificationError> {
        let (text, html) = confirmation.render()?;
        let to: Mailbox = confirmation
            .recipient
            .as_str()
            .parse()
            .map_err(|_| NotificationError::InvalidAddress(confirmation.recipient.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(confirmation.subject())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;

        self.mailer.send(message).await?;
        Ok(())
    }
}

/// Who receives the confirmation: the linked customer's account email, then
/// the guest email on the order, then whatever the provider reported.
#[must_use]
pub fn resolve_recipient(
    order: &Order,
    customer: Option<&Customer>,
    provider_email: Option<&Email>,
) -> Option<Email> {
    customer
        .map(|c| c.email.clone())
        .or_else(|| order.guest_email.clone())
        .or_else(|| provider_email.cloned())
}

/// Fire-and-forget confirmation after an order is paid.
pub struct NotificationDispatcher<'a> {
    notifier: Option<&'a dyn OrderNotifier>,
    customers: &'a dyn CustomerRepository,
}

impl<'a> NotificationDispatcher<'a> {
    #[must_use]
    pub fn new(notifier: Option<&'a dyn OrderNotifier>, repos: &'a Repositories) -> Self {
        Self {
            notifier,
            customers: repos.customers.as_ref(),
        }
    }

    /// Send the confirmation for a freshly paid order. Never fails; returns
    /// whether a message was handed to the notifier successfully.
    #[instrument(skip(self, order, provider_email), fields(order_id = %order.id))]
    pub async fn order_paid(&self, order: &Order, provider_email: Option<&Email>) -> bool {
        let Some(notifier) = self.notifier else {
            info!("Email not configured, skipping order confirmation");
            return false;
        };

        let customer = match order.customer_id {
            Some(id) => match self.customers.get(id).await {
                Ok(customer) => customer,
                Err(e) => {
                    warn!(error = %e, "Customer lookup failed, falling back to order email");
                    None
                }
            },
            None => None,
        };

        let Some(recipient) = resolve_recipient(order, customer.as_ref(), provider_email) else {
            warn!("No email address for order confirmation");
            return false;
        };

        let confirmation = OrderConfirmation {
            recipient,
            customer_name: customer.map(|c| c.name),
            order: order.clone(),
        };

        match notifier.send_order_confirmation(&confirmation).await {
            Ok(()) => {
                info!(to = %confirmation.recipient, "Order confirmation sent");
                true
            }
            Err(e) => {
                error!(error = %e, "Order confirmation failed");
                false
            }
        }
    }
}
