//! # Conversation Handling
//!
//! Seam between the verified webhook boundary and the booking conversation.
//! The conversation logic itself lives elsewhere; it plugs in through
//! [`ConversationHandler`] and answers with a [`ConversationReply`] that is
//! rendered as TwiML for the messaging provider.

use async_trait::async_trait;
use guardpost_core::{CandidateFetcher, InboundMessage};
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{info, instrument};

/// Content type of a TwiML reply
pub const TWIML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Conversation handler failure
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Conversation handling failed: {message}")]
    Failed { message: String },

    #[error("Candidate lookup failed: {0}")]
    Candidates(#[from] guardpost_core::UpstreamError),
}

/// Collaborators a handler may use while answering a message.
#[derive(Clone)]
pub struct ConversationContext {
    /// Ranked guard candidates for booking suggestions
    pub candidates: CandidateFetcher,
}

/// Messages to send back to the sender, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationReply {
    pub messages: Vec<String>,
}

impl ConversationReply {
    /// Acknowledge without replying
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reply with a single message
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    /// Render the reply as a TwiML document
    pub fn to_twiml(&self) -> Result<String, ConversationError> {
        let mut writer = Writer::new(Vec::new());

        let declaration = BytesDecl::new("1.0", Some("UTF-8"), None);
        write_event(&mut writer, Event::Decl(declaration))?;

        if self.messages.is_empty() {
            write_event(&mut writer, Event::Empty(BytesStart::new("Response")))?;
        } else {
            write_event(&mut writer, Event::Start(BytesStart::new("Response")))?;
            for message in &self.messages {
                let text = BytesText::from_escaped(escape(message.as_str()));
                write_event(&mut writer, Event::Start(BytesStart::new("Message")))?;
                write_event(&mut writer, Event::Text(text))?;
                write_event(&mut writer, Event::End(BytesEnd::new("Message")))?;
            }
            write_event(&mut writer, Event::End(BytesEnd::new("Response")))?;
        }

        String::from_utf8(writer.into_inner()).map_err(|e| ConversationError::Failed {
            message: format!("TwiML is not valid UTF-8: {}", e),
        })
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), ConversationError> {
    writer
        .write_event(event)
        .map_err(|e| ConversationError::Failed {
            message: format!("Failed to render TwiML: {}", e),
        })
}

/// Business logic invoked for every verified inbound message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationHandler: Send + Sync {
    async fn handle(
        &self,
        message: InboundMessage,
        context: &ConversationContext,
    ) -> Result<ConversationReply, ConversationError>;
}

/// Handler that accepts every message and sends no reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcknowledgingHandler;

#[async_trait]
impl ConversationHandler for AcknowledgingHandler {
    #[instrument(skip_all, fields(message_sid = message.message_sid.as_deref().unwrap_or("")))]
    async fn handle(
        &self,
        message: InboundMessage,
        _context: &ConversationContext,
    ) -> Result<ConversationReply, ConversationError> {
        info!(
            num_media = message.num_media,
            has_body = !message.body.is_empty(),
            "Inbound message acknowledged"
        );
        Ok(ConversationReply::empty())
    }
}

#[cfg(test)]
#[path = "conversation_tests.rs"]
mod tests;
