use bazaar_shared::models::Product;
use rust_decimal::{Decimal, RoundingStrategy};

/// Price a customer pays for one unit right now.
///
/// `price - price * discount / 100`, with the discount capped at 100% and the
/// result rounded half-up to two decimal places.
pub fn discounted_price(product: &Product) -> Decimal {
    let percent = product.discount_percent.min(100);
    if percent == 0 {
        return product.price;
    }

    let discount = product.price * Decimal::from(percent) / Decimal::ONE_HUNDRED;
    (product.price - discount).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
