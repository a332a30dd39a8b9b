use super::{Chrome, escape, layout};
use crate::core::time;
use crate::shop::accounts::{Address, MIN_PASSWORD_LEN, User};
use axum::response::Html;
use std::fmt::Write;

pub fn login_page(chrome: &Chrome, email: &str) -> Html<String> {
    let body = format!(
        r#"<h1>Sign in</h1>
<form class="stack" method="post" action="/login">
<label>Email <input type="email" name="email" value="{}" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Sign in</button>
</form>
<p>New here? <a href="/register">Create an account</a>.</p>"#,
        escape(email)
    );
    layout(chrome, "Sign in", &body)
}

pub fn register_page(chrome: &Chrome, name: &str, email: &str) -> Html<String> {
    let body = format!(
        r#"<h1>Create an account</h1>
<form class="stack" method="post" action="/register">
<label>Name <input name="name" value="{}" required></label>
<label>Email <input type="email" name="email" value="{}" required></label>
<label>Password <input type="password" name="password" minlength="{}" required></label>
<button type="submit">Register</button>
</form>"#,
        escape(name),
        escape(email),
        MIN_PASSWORD_LEN
    );
    layout(chrome, "Register", &body)
}

pub fn account_page(chrome: &Chrome, user: &User, addresses: &[Address]) -> Html<String> {
    let mut body = format!(
        r#"<h1>Your account</h1><p>{} &lt;{}&gt; &middot; member since {}</p><p><a href="/orders">Order history</a></p>"#,
        escape(&user.name),
        escape(&user.email),
        time::format_date(user.created_at)
    );

    body.push_str("<h2>Addresses</h2>");
    if addresses.is_empty() {
        body.push_str(r#"<p class="muted">No saved addresses.</p>"#);
    }
    for a in addresses {
        let label = if a.label.is_empty() {
            String::new()
        } else {
            format!("<strong>{}</strong> ", escape(&a.label))
        };
        let _ = write!(body, r#"<div class="card">{}{}"#, label, escape(&a.one_line()));
        if a.is_default {
            body.push_str(r#" <span class="muted">(default)</span>"#);
        } else {
            let _ = write!(
                body,
                r#" <form class="inline" method="post" action="/account/addresses/{}/default"><button class="link" type="submit">Make default</button></form>"#,
                a.id
            );
        }
        let _ = write!(
            body,
            r#" <form class="inline" method="post" action="/account/addresses/{}/delete"><button class="link" type="submit">Delete</button></form></div>"#,
            a.id
        );
    }

    body.push_str(
        r#"<h3>Add an address</h3>
<form class="stack" method="post" action="/account/addresses">
<input name="label" placeholder="Label (Home, Work)">
<input name="line1" placeholder="Street address" required>
<input name="line2" placeholder="Apartment, suite (optional)">
<input name="city" placeholder="City" required>
<input name="postal_code" placeholder="Postal code" required>
<input name="country" placeholder="Country" required>
<button type="submit">Save address</button>
</form>"#,
    );
    layout(chrome, "Account", &body)
}
