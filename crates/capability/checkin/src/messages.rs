//! 面向患者的提示文案（德语）。

pub const MSG_NOT_REGISTERED: &str =
    "Karte nicht registriert. Bitte wenden Sie sich an die Rezeption.";
pub const MSG_NO_QUEUE: &str = "Keine aktive Warteschlange verfügbar.";
pub const MSG_UNAVAILABLE: &str =
    "Check-in derzeit nicht möglich. Bitte wenden Sie sich an die Rezeption.";

pub fn resumed_message(ticket_number: &str) -> String {
    format!("Sie sind bereits angemeldet. Ihre Nummer: {}", ticket_number)
}

pub fn welcome_message(first_name: &str) -> String {
    format!(
        "Willkommen, {}! Bitte nehmen Sie im Wartebereich Platz.",
        first_name
    )
}
