//! Email templates and illustration pools.

use plexnotify_core::types::Outcome;
use rand::Rng;
use rand::seq::SliceRandom;

pub const FULFILLED_GIFS: &[&str] = &[
    "https://media.giphy.com/media/EqjqXkrEb9XNEJam1A/giphy.gif",
    "https://media.giphy.com/media/vcchz3ewKCh6Jom9Dg/giphy.gif",
    "https://media.giphy.com/media/HuG4jDKo38YJW/giphy.gif",
];

pub const NOT_FOUND_GIFS: &[&str] = &["https://media.giphy.com/media/pVBUBqNdTdsVuiybM4/giphy.gif"];

/// Subject and HTML body ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub fn image_pool(outcome: Outcome) -> &'static [&'static str] {
    match outcome {
        Outcome::Fulfilled => FULFILLED_GIFS,
        Outcome::NotFound => NOT_FOUND_GIFS,
    }
}

/// Uniform pick from the outcome's pool.
pub fn pick_image<R: Rng + ?Sized>(outcome: Outcome, rng: &mut R) -> Option<&'static str> {
    image_pool(outcome).choose(rng).copied()
}

/// Render the email for `outcome`. `title` and `who` are HTML-escaped.
pub fn render(outcome: Outcome, title: &str, who: &str, curator: &str, image_url: &str) -> RenderedEmail {
    let title_html = escape_html(title);
    let who_html = escape_html(who);
    let curator_html = escape_html(curator);

    match outcome {
        Outcome::Fulfilled => RenderedEmail {
            subject: format!("🙌 Plex Request \"{title}\" is now ready 🙌"),
            html: format!(
                "<p>Hi {who_html}!</p>\
                 <p>{curator_html} has been working tirelessly to make sure your Plex request <strong>{title_html}</strong> is ready for you.</p>\
                 <p>Make sure to compliment their skills and enjoy!</p>\
                 <img src=\"{image_url}\" />"
            ),
        },
        Outcome::NotFound => RenderedEmail {
            subject: format!("🤷‍♂️ Plex Request \"{title}\" not found 🤷‍♂️"),
            html: format!(
                "<p>Hi {who_html}!</p>\
                 <p>Unfortunately {curator_html} was unable to find your Plex request <strong>{title_html}</strong>.</p>\
                 <p>It's probably due to it being hard to pirate either due to rarity or lawyers</p>\
                 <p>So Sorry!</p>\
                 <img src=\"{image_url}\" />"
            ),
        },
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
