use axum::response::Html;

/// Single-question page. Served at `/`.
pub async fn ask_page() -> Html<&'static str> {
    Html(include_str!("assets/ask.html"))
}

/// Conversational page. Served at `/chat`.
pub async fn chat_page() -> Html<&'static str> {
    Html(include_str!("assets/chat.html"))
}
