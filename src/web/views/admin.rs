use super::shop::{order_summary, orders_table};
use super::{Chrome, escape, layout, pager, url_encode};
use crate::core::time;
use crate::shop::accounts::User;
use crate::shop::analytics::Dashboard;
use crate::shop::catalog::{Category, Page, Product};
use crate::shop::coupons::{Coupon, CouponKind};
use crate::shop::orders::{Order, OrderDetail, OrderStatus};
use axum::response::Html;
use std::fmt::Write;

const ADMIN_NAV: &str = r#"<div class="filters"><a href="/admin">Dashboard</a><a href="/admin/products">Products</a><a href="/admin/categories">Categories</a><a href="/admin/orders">Orders</a><a href="/admin/users">Users</a><a href="/admin/coupons">Coupons</a></div>"#;

fn admin_layout(chrome: &Chrome, title: &str, body: &str) -> Html<String> {
    layout(chrome, title, &format!("{}{}", ADMIN_NAV, body))
}

fn price_input(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

pub fn dashboard(chrome: &Chrome, d: &Dashboard, days: i64) -> Html<String> {
    let mut body = String::from("<h1>Dashboard</h1><div class=\"stats\">");
    for (label, value) in [
        ("Revenue", chrome.money(d.revenue_cents)),
        ("Orders", d.order_count.to_string()),
        ("Average order", chrome.money(d.average_order_cents)),
        ("Customers", d.customer_count.to_string()),
        (
            "New customers",
            format!("{} <span class=\"muted\">/ {}d</span>", d.new_customers, days),
        ),
    ] {
        let _ = write!(
            body,
            r#"<div class="card"><span class="muted">{}</span><strong>{}</strong></div>"#,
            label, value
        );
    }
    body.push_str("</div>");

    body.push_str("<h2>Orders by status</h2><table><tr>");
    for (status, _) in &d.status_counts {
        let _ = write!(body, "<th>{}</th>", status.as_str());
    }
    body.push_str("</tr><tr>");
    for (status, n) in &d.status_counts {
        let _ = write!(
            body,
            r#"<td><a href="/admin/orders?status={}">{}</a></td>"#,
            status.as_str(),
            n
        );
    }
    body.push_str("</tr></table>");

    let _ = write!(body, "<h2>Revenue, last {} days</h2><table>", days);
    let peak = d.daily.iter().map(|x| x.revenue_cents).max().unwrap_or(0).max(1);
    for day in &d.daily {
        let width = day.revenue_cents * 100 / peak;
        let _ = write!(
            body,
            r#"<tr><td>{}</td><td class="num">{}</td><td class="num">{}</td><td style="width:50%"><div class="bar" style="width:{}%"></div></td></tr>"#,
            time::format_date(day.day_start),
            day.orders,
            chrome.money(day.revenue_cents),
            width
        );
    }
    body.push_str("</table>");

    body.push_str("<h2>Top products</h2>");
    if d.top_products.is_empty() {
        body.push_str(r#"<p class="muted">No sales yet.</p>"#);
    } else {
        body.push_str(r#"<table><tr><th>Product</th><th class="num">Units</th><th class="num">Revenue</th></tr>"#);
        for p in &d.top_products {
            let _ = write!(
                body,
                r#"<tr><td>{}</td><td class="num">{}</td><td class="num">{}</td></tr>"#,
                escape(&p.name),
                p.units,
                chrome.money(p.revenue_cents)
            );
        }
        body.push_str("</table>");
    }

    body.push_str("<h2>Low stock</h2>");
    if d.low_stock.is_empty() {
        body.push_str(r#"<p class="muted">Everything is well stocked.</p>"#);
    } else {
        body.push_str("<table><tr><th>Product</th><th class=\"num\">Stock</th></tr>");
        for p in &d.low_stock {
            let _ = write!(
                body,
                r#"<tr><td><a href="/admin/products/{}/edit">{}</a></td><td class="num">{}</td></tr>"#,
                p.id,
                escape(&p.name),
                p.stock
            );
        }
        body.push_str("</table>");
    }
    admin_layout(chrome, "Dashboard", &body)
}

pub fn products(chrome: &Chrome, page: &Page<Product>, categories: &[Category]) -> Html<String> {
    let mut body = String::from(
        r#"<h1>Products</h1><p><a href="/admin/products/new">+ New product</a></p>
<table><tr><th>Name</th><th>Category</th><th class="num">Price</th><th class="num">Stock</th><th>Active</th><th></th></tr>"#,
    );
    for p in &page.items {
        let category = p
            .category_id
            .and_then(|id| categories.iter().find(|c| c.id == id))
            .map(|c| escape(&c.name))
            .unwrap_or_default();
        let _ = write!(
            body,
            r#"<tr><td><a href="/admin/products/{id}/edit">{name}</a></td><td>{cat}</td><td class="num">{price}</td><td class="num">{stock}</td><td>{active}</td>
<td><form class="inline" method="post" action="/admin/products/{id}/delete"><button class="link" type="submit">Delete</button></form></td></tr>"#,
            id = p.id,
            name = escape(&p.name),
            cat = category,
            price = chrome.money(p.price_cents),
            stock = p.stock,
            active = if p.is_active { "yes" } else { "no" },
        );
    }
    body.push_str("</table>");
    body.push_str(&pager("/admin/products", page.page, page.total_pages()));
    admin_layout(chrome, "Products", &body)
}

pub fn product_form(
    chrome: &Chrome,
    product: Option<&Product>,
    categories: &[Category],
) -> Html<String> {
    let (title, action) = match product {
        Some(p) => (
            format!("Edit {}", p.name),
            format!("/admin/products/{}/edit", p.id),
        ),
        None => ("New product".to_string(), "/admin/products/new".to_string()),
    };
    let mut options = String::from(r#"<option value="">(none)</option>"#);
    for c in categories {
        let selected = if product.and_then(|p| p.category_id) == Some(c.id) {
            " selected"
        } else {
            ""
        };
        let _ = write!(
            options,
            r#"<option value="{}"{}>{}</option>"#,
            c.id,
            selected,
            escape(&c.name)
        );
    }
    let active = product.map(|p| p.is_active).unwrap_or(true);
    let body = format!(
        r#"<h1>{title}</h1>
<form class="stack" method="post" action="{action}">
<label>Name <input name="name" value="{name}" required></label>
<label>Category <select name="category_id">{options}</select></label>
<label>Price <input name="price" value="{price}" inputmode="decimal" required></label>
<label>Stock <input type="number" name="stock" value="{stock}" min="0" required></label>
<label>Description <textarea name="description" rows="5">{desc}</textarea></label>
<label><input type="checkbox" name="is_active" value="on"{checked}> Active</label>
<button type="submit">Save</button>
</form>"#,
        title = escape(&title),
        action = action,
        name = escape(product.map(|p| p.name.as_str()).unwrap_or("")),
        options = options,
        price = product.map(|p| price_input(p.price_cents)).unwrap_or_default(),
        stock = product.map(|p| p.stock).unwrap_or(0),
        desc = escape(product.map(|p| p.description.as_str()).unwrap_or("")),
        checked = if active { " checked" } else { "" },
    );
    admin_layout(chrome, &title, &body)
}

pub fn categories(chrome: &Chrome, categories: &[(Category, i64)]) -> Html<String> {
    let mut body = String::from(
        r#"<h1>Categories</h1><table><tr><th>Name</th><th>Slug</th><th class="num">Products</th><th></th></tr>"#,
    );
    for (c, count) in categories {
        let _ = write!(
            body,
            r#"<tr><td>
<form class="inline" method="post" action="/admin/categories/{id}/edit"><input name="name" value="{name}"><input name="description" value="{desc}"><button type="submit">Save</button></form>
</td><td>{slug}</td><td class="num">{count}</td>
<td><form class="inline" method="post" action="/admin/categories/{id}/delete"><button class="link" type="submit">Delete</button></form></td></tr>"#,
            id = c.id,
            name = escape(&c.name),
            desc = escape(&c.description),
            slug = escape(&c.slug),
            count = count,
        );
    }
    body.push_str(
        r#"</table><h2>New category</h2>
<form class="stack" method="post" action="/admin/categories">
<input name="name" placeholder="Name" required>
<input name="description" placeholder="Description">
<button type="submit">Create</button>
</form>"#,
    );
    admin_layout(chrome, "Categories", &body)
}

pub fn orders(chrome: &Chrome, page: &Page<Order>, status: Option<OrderStatus>) -> Html<String> {
    let mut body = String::from(r#"<h1>Orders</h1><div class="filters"><a href="/admin/orders">All</a>"#);
    for st in OrderStatus::ALL {
        let _ = write!(
            body,
            r#"<a href="/admin/orders?status={0}">{0}</a>"#,
            st.as_str()
        );
    }
    body.push_str("</div>");
    body.push_str(&orders_table(chrome, &page.items, "/admin/orders"));
    let base = match status {
        Some(st) => format!("/admin/orders?status={}", st.as_str()),
        None => "/admin/orders".to_string(),
    };
    body.push_str(&pager(&base, page.page, page.total_pages()));
    admin_layout(chrome, "Orders", &body)
}

pub fn order_detail(chrome: &Chrome, detail: &OrderDetail) -> Html<String> {
    let o = &detail.order;
    let mut body = format!(
        "<h1>Order {}</h1><p>Customer: {}</p>",
        escape(&o.number),
        escape(&detail.customer_email)
    );
    body.push_str(&order_summary(chrome, detail));
    let next = o.status.next_allowed();
    if !next.is_empty() {
        let _ = write!(
            body,
            r#"<form class="inline" method="post" action="/admin/orders/{}/status"><select name="status">"#,
            url_encode(&o.number)
        );
        for st in next {
            let _ = write!(body, r#"<option value="{0}">{0}</option>"#, st.as_str());
        }
        body.push_str(r#"</select><button type="submit">Update status</button></form>"#);
    }
    body.push_str(r#"<p><a href="/admin/orders">&larr; All orders</a></p>"#);
    admin_layout(chrome, &format!("Order {}", o.number), &body)
}

pub fn users(chrome: &Chrome, users: &[User]) -> Html<String> {
    let me = chrome.user.as_ref().map(|u| u.id);
    let mut body = String::from(
        r#"<h1>Users</h1><table><tr><th>Name</th><th>Email</th><th>Joined</th><th>Admin</th><th></th></tr>"#,
    );
    for u in users {
        let action = if Some(u.id) == me {
            String::new()
        } else {
            let (value, label) = if u.is_admin {
                ("0", "Revoke admin")
            } else {
                ("1", "Make admin")
            };
            format!(
                r#"<form class="inline" method="post" action="/admin/users/{}/admin"><input type="hidden" name="is_admin" value="{}"><button class="link" type="submit">{}</button></form>"#,
                u.id, value, label
            )
        };
        let _ = write!(
            body,
            r#"<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
            escape(&u.name),
            escape(&u.email),
            time::format_date(u.created_at),
            if u.is_admin { "yes" } else { "no" },
            action
        );
    }
    body.push_str("</table>");
    admin_layout(chrome, "Users", &body)
}

pub fn coupons(chrome: &Chrome, coupons: &[Coupon]) -> Html<String> {
    let mut body = String::from(
        r#"<h1>Coupons</h1><table><tr><th>Code</th><th>Discount</th><th class="num">Minimum</th><th>Last day</th><th class="num">Used</th><th>Active</th><th></th></tr>"#,
    );
    for c in coupons {
        let discount = match c.kind {
            CouponKind::Percent => format!("{}%", c.value),
            CouponKind::Fixed => chrome.money(c.value),
        };
        let used = match c.usage_limit {
            Some(limit) => format!("{} / {}", c.used_count, limit),
            None => c.used_count.to_string(),
        };
        let _ = write!(
            body,
            r#"<tr><td>{code}</td><td>{discount}</td><td class="num">{min}</td><td>{exp}</td><td class="num">{used}</td><td>{active}</td>
<td><form class="inline" method="post" action="/admin/coupons/{id}/toggle"><button class="link" type="submit">{toggle}</button></form>
<form class="inline" method="post" action="/admin/coupons/{id}/delete"><button class="link" type="submit">Delete</button></form></td></tr>"#,
            code = escape(&c.code),
            discount = discount,
            min = chrome.money(c.min_subtotal_cents),
            exp = c
                .expires_at
                .map(|t| time::format_date(t - 1))
                .unwrap_or_else(|| "never".to_string()),
            used = used,
            active = if c.is_active { "yes" } else { "no" },
            id = c.id,
            toggle = if c.is_active { "Disable" } else { "Enable" },
        );
    }
    body.push_str(
        r#"</table><h2>New coupon</h2>
<form class="stack" method="post" action="/admin/coupons">
<input name="code" placeholder="CODE" required>
<select name="kind"><option value="percent">Percent off</option><option value="fixed">Fixed amount off</option></select>
<input name="value" placeholder="Percent (e.g. 10) or amount (e.g. 5.00)" required>
<input name="min_subtotal" placeholder="Minimum subtotal (optional)">
<input type="date" name="expires_on">
<input type="number" name="usage_limit" min="1" placeholder="Usage limit (optional)">
<button type="submit">Create</button>
</form>"#,
    );
    admin_layout(chrome, "Coupons", &body)
}
