//! Reading the login form.

use std::sync::LazyLock;

use scraper::{Html, Selector};

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(AUTHENTICITY_TOKEN, "input[name='authenticity_token']");
selector!(LOGIN_FORM, "form input[name='user[password]']");

/// The CSRF token embedded in the login page.
pub(crate) fn authenticity_token(html: &str) -> Option<String> {
    Html::parse_document(html)
        .select(&AUTHENTICITY_TOKEN)
        .filter_map(|input| input.value().attr("value"))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// `true` when the page still offers a password field, i.e. the login was
/// not accepted.
pub(crate) fn has_login_form(html: &str) -> bool {
    Html::parse_document(html).select(&LOGIN_FORM).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"<html><body>
        <form action="/user_sessions" method="post">
          <input type="hidden" name="authenticity_token" value=" tok3n== ">
          <input type="email" name="user[email]">
          <input type="password" name="user[password]">
        </form></body></html>"#;

    #[test]
    fn reads_token_and_form() {
        assert_eq!(authenticity_token(LOGIN_PAGE).as_deref(), Some("tok3n=="));
        assert!(has_login_form(LOGIN_PAGE));
    }

    #[test]
    fn ordinary_page_has_neither() {
        let html = "<html><body><div class=\"movie-list\"></div></body></html>";
        assert_eq!(authenticity_token(html), None);
        assert!(!has_login_form(html));
    }
}
