use crate::core::UserLookupResult;

/// Name used in prompts when the caller did not give one.
pub const UNKNOWN_CALLER: &str = "לא ידוע";

const NO_MATCHING_CUSTOMER: &str = "לא נמצא לקוח תואם במסד הנתונים.";

/// Sentence describing what the customer-record service knows.
pub fn lookup_note(lookup: &UserLookupResult) -> String {
    if !lookup.found {
        return NO_MATCHING_CUSTOMER.to_string();
    }

    format!(
        "הלקוח {} קיים במערכת מאז {}.",
        lookup.display_name.as_deref().unwrap_or(UNKNOWN_CALLER),
        lookup.registered_at.as_deref().unwrap_or(UNKNOWN_CALLER),
    )
}

pub fn chat_prompt(name: Option<&str>, message: &str, lookup: &UserLookupResult) -> String {
    format!(
        "לקוח בשם {} שולח הודעה: \"{}\".\n{}\nענה לו בצורה נעימה, בעברית, בהתבסס על המידע הזה.",
        name.unwrap_or(UNKNOWN_CALLER),
        message,
        lookup_note(lookup),
    )
}

pub fn registration_prompt(name: Option<&str>, phone: Option<&str>, message: &str) -> String {
    format!(
        "נרשם חדש בשם {} (טלפון: {}) מבקש הודעת ברכה בעברית.\nהודעה מקורית: \"{}\"",
        name.unwrap_or(UNKNOWN_CALLER),
        phone.unwrap_or(UNKNOWN_CALLER),
        message,
    )
}
