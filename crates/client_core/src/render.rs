//! Rendering seam between a session and whatever surface displays it.

use shared::domain::{Quote, ReactionRecord};

pub const PLACEHOLDER: &str = "Loading...";

/// Two display regions: the quote itself and its reaction counts.
pub trait QuoteRenderer {
    fn render_placeholder(&mut self) {}
    fn render_quote(&mut self, quote: &Quote);
    fn render_counts(&mut self, record: &ReactionRecord);
}

impl<R: QuoteRenderer + ?Sized> QuoteRenderer for Box<R> {
    fn render_placeholder(&mut self) {
        (**self).render_placeholder()
    }

    fn render_quote(&mut self, quote: &Quote) {
        (**self).render_quote(quote)
    }

    fn render_counts(&mut self, record: &ReactionRecord) {
        (**self).render_counts(record)
    }
}

pub fn format_quote(quote: &Quote) -> String {
    format!("\"{}\"\n— {}", quote.text, quote.author)
}

pub fn format_counts(record: &ReactionRecord) -> String {
    format!("Likes: {}  Dislikes: {}", record.likes, record.dislikes)
}
