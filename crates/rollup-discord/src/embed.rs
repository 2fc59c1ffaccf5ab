//! Digest cards to serenity embeds.

use serenity::builder::CreateEmbed;
use serenity::model::Timestamp;

use rollup_digest::DigestCard;

/// Convert a card to a serenity `CreateEmbed` builder.
pub fn to_create_embed(card: &DigestCard) -> CreateEmbed {
    let mut e = CreateEmbed::new()
        .title(&card.title)
        .description(&card.description)
        .colour(card.colour);
    if let Some(ref url) = card.url {
        e = e.url(url);
    }
    for field in &card.fields {
        e = e.field(&field.name, &field.value, field.inline);
    }
    if let Ok(ts) = Timestamp::from_unix_timestamp(card.timestamp.timestamp()) {
        e = e.timestamp(ts);
    }
    e
}
