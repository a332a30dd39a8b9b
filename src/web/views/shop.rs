use super::{Chrome, escape, layout, pager, stars, url_encode};
use crate::core::{output, time};
use crate::shop::accounts::Address;
use crate::shop::cart::CartView;
use crate::shop::catalog::{Category, Page, Product, ProductSort};
use crate::shop::checkout::Totals;
use crate::shop::orders::{Order, OrderDetail, OrderStatus};
use crate::shop::reviews::{RatingSummary, Review};
use axum::response::Html;
use std::fmt::Write;

pub struct ListFilter<'a> {
    pub category: Option<&'a Category>,
    pub search: &'a str,
    pub sort: ProductSort,
}

impl ListFilter<'_> {
    fn base_path(&self) -> String {
        match self.category {
            Some(c) => format!("/category/{}", url_encode(&c.slug)),
            None => "/".to_string(),
        }
    }

    /// Current filters as a link target, for the pager.
    fn link(&self) -> String {
        let mut params = Vec::new();
        if !self.search.is_empty() {
            params.push(format!("q={}", url_encode(self.search)));
        }
        if self.sort != ProductSort::Newest {
            params.push(format!("sort={}", self.sort.as_str()));
        }
        if params.is_empty() {
            self.base_path()
        } else {
            format!("{}?{}", self.base_path(), params.join("&"))
        }
    }
}

fn product_card(chrome: &Chrome, p: &Product) -> String {
    let stock = if p.in_stock() {
        String::new()
    } else {
        r#"<div class="stock-out">Out of stock</div>"#.to_string()
    };
    format!(
        r#"<div class="card"><h3><a href="/product/{slug}">{name}</a></h3><p class="muted">{desc}</p><div class="price">{price}</div>{stock}</div>"#,
        slug = url_encode(&p.slug),
        name = escape(&p.name),
        desc = escape(&output::excerpt(&p.description, 90)),
        price = chrome.money(p.price_cents),
        stock = stock,
    )
}

pub fn product_list(
    chrome: &Chrome,
    categories: &[Category],
    page: &Page<Product>,
    filter: &ListFilter<'_>,
) -> Html<String> {
    let mut body = String::new();
    let heading = filter
        .category
        .map(|c| c.name.as_str())
        .unwrap_or("All products");
    let _ = write!(body, "<h1>{}</h1>", escape(heading));
    if let Some(c) = filter.category.filter(|c| !c.description.is_empty()) {
        let _ = write!(body, r#"<p class="muted">{}</p>"#, escape(&c.description));
    }

    body.push_str(r#"<div class="filters"><a href="/">All</a>"#);
    for c in categories {
        let _ = write!(
            body,
            r#"<a href="/category/{}">{}</a>"#,
            url_encode(&c.slug),
            escape(&c.name)
        );
    }
    body.push_str("</div>");

    let _ = write!(
        body,
        r#"<form class="filters" method="get" action="{action}"><input type="search" name="q" value="{q}" placeholder="Search products"><select name="sort">"#,
        action = filter.base_path(),
        q = escape(filter.search),
    );
    for sort in [
        ProductSort::Newest,
        ProductSort::PriceAsc,
        ProductSort::PriceDesc,
        ProductSort::Name,
    ] {
        let label = match sort {
            ProductSort::Newest => "Newest",
            ProductSort::PriceAsc => "Price: low to high",
            ProductSort::PriceDesc => "Price: high to low",
            ProductSort::Name => "Name",
        };
        let selected = if sort == filter.sort { " selected" } else { "" };
        let _ = write!(
            body,
            r#"<option value="{}"{}>{}</option>"#,
            sort.as_str(),
            selected,
            label
        );
    }
    body.push_str(r#"</select><button type="submit">Apply</button></form>"#);

    if page.items.is_empty() {
        body.push_str(r#"<p class="muted">No products match.</p>"#);
    } else {
        body.push_str(r#"<div class="grid">"#);
        for p in &page.items {
            body.push_str(&product_card(chrome, p));
        }
        body.push_str("</div>");
    }
    body.push_str(&pager(&filter.link(), page.page, page.total_pages()));

    layout(chrome, heading, &body)
}

pub fn product_detail(
    chrome: &Chrome,
    product: &Product,
    category: Option<&Category>,
    reviews: &[Review],
    summary: &RatingSummary,
) -> Html<String> {
    let mut body = String::new();
    if let Some(c) = category {
        let _ = write!(
            body,
            r#"<p class="muted"><a href="/category/{}">{}</a></p>"#,
            url_encode(&c.slug),
            escape(&c.name)
        );
    }
    let _ = write!(
        body,
        r#"<h1>{}</h1><p class="price">{}</p><p>{}</p>"#,
        escape(&product.name),
        chrome.money(product.price_cents),
        escape(&product.description)
    );

    if product.in_stock() {
        let _ = write!(
            body,
            r#"<p class="muted">{} in stock</p>
<form class="inline" method="post" action="/cart/add">
<input type="hidden" name="product_id" value="{}">
<input type="number" name="quantity" value="1" min="1" max="{}">
<button type="submit">Add to cart</button>
</form>"#,
            product.stock, product.id, product.stock
        );
    } else {
        body.push_str(r#"<p class="stock-out">Out of stock</p>"#);
    }

    body.push_str("<h2>Reviews</h2>");
    if summary.count > 0 {
        let _ = write!(
            body,
            r#"<p>{} {:.1} from {} review(s)</p>"#,
            stars(summary.average),
            summary.average,
            summary.count
        );
    }
    for r in reviews {
        let _ = write!(
            body,
            r#"<div class="card"><strong>{}</strong> {} <span class="muted">{}</span><p>{}</p>"#,
            escape(&r.author_name),
            stars(r.rating as f64),
            time::format_date(r.created_at),
            escape(&r.body)
        );
        if chrome.is_admin() {
            let _ = write!(
                body,
                r#"<form class="inline" method="post" action="/admin/reviews/{}/delete"><button class="link" type="submit">Delete</button></form>"#,
                r.id
            );
        }
        body.push_str("</div>");
    }
    if reviews.is_empty() {
        body.push_str(r#"<p class="muted">No reviews yet.</p>"#);
    }

    let reviewed = chrome
        .user
        .as_ref()
        .is_some_and(|u| reviews.iter().any(|r| r.user_id == u.id));
    match &chrome.user {
        Some(_) if !reviewed => {
            let _ = write!(
                body,
                r#"<h3>Write a review</h3>
<form class="stack" method="post" action="/product/{}/review">
<select name="rating"><option value="5">5 - Excellent</option><option value="4">4 - Good</option><option value="3">3 - OK</option><option value="2">2 - Poor</option><option value="1">1 - Bad</option></select>
<textarea name="body" rows="4" maxlength="2000"></textarea>
<button type="submit">Post review</button>
</form>"#,
                url_encode(&product.slug)
            );
        }
        Some(_) => {}
        None => body.push_str(r#"<p><a href="/login">Sign in</a> to write a review.</p>"#),
    }

    layout(chrome, &product.name, &body)
}

pub fn totals_table(chrome: &Chrome, totals: &Totals) -> String {
    let mut out = String::from(r#"<table class="totals">"#);
    let _ = write!(
        out,
        r#"<tr><td>Subtotal</td><td class="num">{}</td></tr>"#,
        chrome.money(totals.subtotal_cents)
    );
    if totals.discount_cents > 0 {
        let _ = write!(
            out,
            r#"<tr><td>Discount</td><td class="num">-{}</td></tr>"#,
            chrome.money(totals.discount_cents)
        );
    }
    let shipping = if totals.shipping_cents == 0 {
        "Free".to_string()
    } else {
        chrome.money(totals.shipping_cents)
    };
    let _ = write!(
        out,
        r#"<tr><td>Shipping</td><td class="num">{}</td></tr>"#,
        shipping
    );
    if totals.tax_cents > 0 {
        let _ = write!(
            out,
            r#"<tr><td>Tax</td><td class="num">{}</td></tr>"#,
            chrome.money(totals.tax_cents)
        );
    }
    let _ = write!(
        out,
        r#"<tr class="grand"><td>Total</td><td class="num">{}</td></tr></table>"#,
        chrome.money(totals.total_cents)
    );
    out
}

pub fn cart_page(
    chrome: &Chrome,
    cart: &CartView,
    totals: &Totals,
    coupon_code: Option<&str>,
) -> Html<String> {
    let mut body = String::from("<h1>Your cart</h1>");
    if cart.is_empty() {
        body.push_str(r#"<p class="muted">Your cart is empty. <a href="/">Keep shopping</a>.</p>"#);
        return layout(chrome, "Cart", &body);
    }

    body.push_str(
        r#"<table><tr><th>Product</th><th class="num">Price</th><th>Quantity</th><th class="num">Total</th><th></th></tr>"#,
    );
    for item in &cart.items {
        let _ = write!(
            body,
            r#"<tr><td><a href="/product/{slug}">{name}</a></td><td class="num">{price}</td>
<td><form class="inline" method="post" action="/cart/update"><input type="hidden" name="product_id" value="{id}"><input type="number" name="quantity" value="{qty}" min="0" max="{max}"><button type="submit">Update</button></form></td>
<td class="num">{total}</td>
<td><form class="inline" method="post" action="/cart/remove"><input type="hidden" name="product_id" value="{id}"><button class="link" type="submit">Remove</button></form></td></tr>"#,
            slug = url_encode(&item.slug),
            name = escape(&item.name),
            price = chrome.money(item.unit_price_cents),
            id = item.product_id,
            qty = item.quantity,
            max = item.available,
            total = chrome.money(item.line_total_cents),
        );
    }
    body.push_str("</table>");

    match coupon_code {
        Some(code) => {
            let _ = write!(
                body,
                r#"<p>Coupon <strong>{}</strong> applied. <form class="inline" method="post" action="/cart/coupon/clear"><button class="link" type="submit">Remove</button></form></p>"#,
                escape(code)
            );
        }
        None => body.push_str(
            r#"<form class="inline" method="post" action="/cart/coupon"><input name="code" placeholder="Coupon code"><button type="submit">Apply</button></form>"#,
        ),
    }

    body.push_str(&totals_table(chrome, totals));
    body.push_str(r#"<p><a href="/checkout">Proceed to checkout &rarr;</a></p>"#);
    layout(chrome, "Cart", &body)
}

pub fn checkout_page(
    chrome: &Chrome,
    cart: &CartView,
    totals: &Totals,
    addresses: &[Address],
) -> Html<String> {
    let mut body = String::from("<h1>Checkout</h1>");
    body.push_str("<table><tr><th>Product</th><th>Qty</th><th class=\"num\">Total</th></tr>");
    for item in &cart.items {
        let _ = write!(
            body,
            r#"<tr><td>{}</td><td>{}</td><td class="num">{}</td></tr>"#,
            escape(&item.name),
            item.quantity,
            chrome.money(item.line_total_cents)
        );
    }
    body.push_str("</table>");
    body.push_str(&totals_table(chrome, totals));

    if addresses.is_empty() {
        body.push_str(
            r#"<p>Add a shipping address on your <a href="/account">account page</a> before placing an order.</p>"#,
        );
        return layout(chrome, "Checkout", &body);
    }

    body.push_str(r#"<form class="stack" method="post" action="/checkout"><h2>Ship to</h2>"#);
    for a in addresses {
        let checked = if a.is_default { " checked" } else { "" };
        let _ = write!(
            body,
            r#"<label><input type="radio" name="address_id" value="{}"{}> {}</label>"#,
            a.id,
            checked,
            escape(&a.one_line())
        );
    }
    body.push_str(r#"<button type="submit">Place order</button></form>"#);
    layout(chrome, "Checkout", &body)
}

fn status_badge(status: OrderStatus) -> String {
    format!(r#"<span class="status {0}">{0}</span>"#, status.as_str())
}

pub fn orders_table(chrome: &Chrome, orders: &[Order], link_prefix: &str) -> String {
    let mut out = String::from(
        r#"<table><tr><th>Order</th><th>Date</th><th>Status</th><th class="num">Total</th></tr>"#,
    );
    for o in orders {
        let _ = write!(
            out,
            r#"<tr><td><a href="{}/{}">{}</a></td><td>{}</td><td>{}</td><td class="num">{}</td></tr>"#,
            link_prefix,
            escape(&o.number),
            escape(&o.number),
            time::format_datetime(o.created_at),
            status_badge(o.status),
            chrome.money(o.total_cents)
        );
    }
    out.push_str("</table>");
    out
}

pub fn orders_page(chrome: &Chrome, orders: &[Order]) -> Html<String> {
    let mut body = String::from("<h1>Your orders</h1>");
    if orders.is_empty() {
        body.push_str(r#"<p class="muted">You haven't placed any orders yet.</p>"#);
    } else {
        body.push_str(&orders_table(chrome, orders, "/orders"));
    }
    layout(chrome, "Orders", &body)
}

/// Items and totals of an order; shared with the admin detail page.
pub fn order_summary(chrome: &Chrome, detail: &OrderDetail) -> String {
    let o = &detail.order;
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<p>Placed {} &middot; {}</p><p>Ship to: {}</p>"#,
        time::format_datetime(o.created_at),
        status_badge(o.status),
        escape(&o.ship_to)
    );
    out.push_str(
        r#"<table><tr><th>Product</th><th class="num">Price</th><th>Qty</th><th class="num">Total</th></tr>"#,
    );
    for item in &detail.items {
        let _ = write!(
            out,
            r#"<tr><td>{}</td><td class="num">{}</td><td>{}</td><td class="num">{}</td></tr>"#,
            escape(&item.product_name),
            chrome.money(item.unit_price_cents),
            item.quantity,
            chrome.money(item.line_total_cents())
        );
    }
    out.push_str("</table>");
    if let Some(code) = &o.coupon_code {
        let _ = write!(out, "<p>Coupon: {}</p>", escape(code));
    }
    out.push_str(&totals_table(
        chrome,
        &Totals {
            subtotal_cents: o.subtotal_cents,
            discount_cents: o.discount_cents,
            shipping_cents: o.shipping_cents,
            tax_cents: o.tax_cents,
            total_cents: o.total_cents,
        },
    ));
    out
}

pub fn order_detail(chrome: &Chrome, detail: &OrderDetail) -> Html<String> {
    let o = &detail.order;
    let mut body = format!("<h1>Order {}</h1>", escape(&o.number));
    body.push_str(&order_summary(chrome, detail));
    if o.status == OrderStatus::Pending {
        let _ = write!(
            body,
            r#"<form method="post" action="/orders/{}/cancel"><button class="danger" type="submit">Cancel order</button></form>"#,
            url_encode(&o.number)
        );
    }
    body.push_str(r#"<p><a href="/orders">&larr; All orders</a></p>"#);
    layout(chrome, &format!("Order {}", o.number), &body)
}
