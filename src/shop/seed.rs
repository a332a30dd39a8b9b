//! Demo catalog for local development. Safe to run repeatedly: rows are
//! matched by slug or code and skipped when present.

use crate::core::error::ShopError;
use crate::shop::catalog::{self, ProductInput};
use crate::shop::coupons::{self, CouponKind, NewCoupon};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: usize,
    pub products: usize,
    pub coupons: usize,
}

const CATEGORIES: &[(&str, &str)] = &[
    ("Coffee", "Whole-bean and ground roasts."),
    ("Tea", "Loose-leaf teas and tisanes."),
    ("Brewing Gear", "Kettles, grinders and pour-over kits."),
];

// (category, name, price cents, stock, description)
const PRODUCTS: &[(&str, &str, i64, i64, &str)] = &[
    ("Coffee", "House Espresso Blend", 1600, 40, "Chocolate, caramel and a long finish."),
    ("Coffee", "Ethiopia Guji", 1900, 25, "Bright stone fruit with a floral aroma."),
    ("Coffee", "Decaf Colombia", 1500, 3, "Swiss-water processed, sweet and round."),
    ("Tea", "Sencha", 1200, 30, "Grassy Japanese green tea."),
    ("Tea", "Assam Breakfast", 900, 50, "Malty black tea that takes milk well."),
    ("Brewing Gear", "Gooseneck Kettle", 4500, 10, "Stovetop kettle with a precise pour."),
    ("Brewing Gear", "Hand Grinder", 6900, 4, "Steel burrs, 40 click settings."),
    ("Brewing Gear", "Paper Filters (100)", 600, 0, "Fits size 02 drippers."),
];

pub fn seed_demo(conn: &Connection) -> Result<SeedReport, ShopError> {
    let tx = conn.unchecked_transaction()?;
    let mut report = SeedReport::default();

    for (name, description) in CATEGORIES {
        let slug = catalog::slugify(name);
        if catalog::get_category_by_slug(&tx, &slug).is_err() {
            catalog::create_category(&tx, name, description)?;
            report.categories += 1;
        }
    }

    for (category, name, price, stock, description) in PRODUCTS {
        if catalog::get_product_by_slug(&tx, &catalog::slugify(name), true).is_ok() {
            continue;
        }
        let category = catalog::get_category_by_slug(&tx, &catalog::slugify(category))?;
        catalog::create_product(
            &tx,
            &ProductInput {
                name: name.to_string(),
                category_id: Some(category.id),
                description: description.to_string(),
                price_cents: *price,
                stock: *stock,
                is_active: true,
            },
        )?;
        report.products += 1;
    }

    if coupons::find_by_code(&tx, "WELCOME10")?.is_none() {
        coupons::create_coupon(
            &tx,
            &NewCoupon {
                code: "WELCOME10".to_string(),
                kind: CouponKind::Percent,
                value: 10,
                min_subtotal_cents: 0,
                expires_at: None,
                usage_limit: None,
            },
        )?;
        report.coupons += 1;
    }

    tx.commit()?;
    Ok(report)
}
