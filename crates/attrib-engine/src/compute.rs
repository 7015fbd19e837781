//! Pure attribution computation over already-loaded rows.

use std::collections::HashMap;

use attrib_core::AttributionMethod;
use attrib_db::{CampaignLinkRow, NewConversion, OrderWithItems};
use rust_decimal::Decimal;

/// Everything the computation needs, loaded up front by the run driver.
#[derive(Debug)]
pub struct ComputeInput<'a> {
    pub links: &'a [CampaignLinkRow],
    pub orders: &'a [OrderWithItems],
    /// Campaign id → total spend across the window. Campaigns absent from
    /// the map count as zero spend.
    pub spend_by_campaign: &'a HashMap<String, Decimal>,
}

/// Computes one conversion draft per (order line, surviving link) pair.
///
/// For each order line carrying a SKU, candidate links sharing that SKU are
/// filtered to those whose validity window contains the order date. The
/// line's value and each campaign's spend share are then split equally
/// across the survivors (`weight = 1/n`). A campaign's window spend is
/// spread evenly over *all* orders in the window before the split — matched
/// or not — which under-attributes when match rates are low; that is the
/// established behavior and is kept deliberately.
///
/// Lines without a SKU, SKUs with no link, and lines whose every candidate
/// falls outside its validity window produce nothing.
#[must_use]
pub fn compute_conversions(input: &ComputeInput<'_>) -> Vec<NewConversion> {
    let mut by_sku: HashMap<&str, Vec<&CampaignLinkRow>> = HashMap::new();
    for link in input.links {
        by_sku.entry(link.product_sku.as_str()).or_default().push(link);
    }

    let order_count = Decimal::from(input.orders.len().max(1));
    let mut conversions = Vec::new();

    for order in input.orders {
        let order_date = order.order_date();

        for item in &order.items {
            let Some(sku) = item.sku.as_deref().filter(|s| !s.is_empty()) else {
                continue;
            };
            let Some(candidates) = by_sku.get(sku) else {
                continue;
            };

            let surviving: Vec<&CampaignLinkRow> = candidates
                .iter()
                .copied()
                .filter(|link| link.covers(order_date))
                .collect();
            if surviving.is_empty() {
                continue;
            }

            let weight = Decimal::ONE / Decimal::from(surviving.len());
            let method = if surviving.len() > 1 {
                AttributionMethod::Proportional
            } else {
                AttributionMethod::TimeWindow
            };
            let order_value = item.unit_price * Decimal::from(item.quantity);

            for link in surviving {
                let campaign_spend = input
                    .spend_by_campaign
                    .get(&link.campaign_id)
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                let attributed_spend = campaign_spend * weight / order_count;

                conversions.push(NewConversion {
                    organization_id: order.order.organization_id,
                    user_id: link.user_id,
                    order_id: order.order.id,
                    campaign_id: link.campaign_id.clone(),
                    campaign_name: link.campaign_name.clone(),
                    platform: link.platform.clone(),
                    product_id: link.product_id,
                    product_sku: link.product_sku.clone(),
                    attributed_spend,
                    order_value,
                    quantity: item.quantity,
                    attribution_method: method,
                    attribution_weight: weight,
                    conversion_date: order_date,
                });
            }
        }
    }

    conversions
}

#[cfg(test)]
mod tests {
    use super::*;
    use attrib_db::{OrderItemRow, OrderRow};
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn org() -> Uuid {
        Uuid::from_u128(1)
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().expect("date literal")
    }

    fn link(id: i64, campaign_id: &str, sku: &str) -> CampaignLinkRow {
        CampaignLinkRow {
            id,
            organization_id: org(),
            user_id: None,
            campaign_id: campaign_id.to_string(),
            campaign_name: format!("Campaign {campaign_id}"),
            platform: "meta".to_string(),
            product_id: Some(id),
            product_sku: sku.to_string(),
            is_active: true,
            start_date: None,
            end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn order(id: i64, date: &str, items: Vec<(Option<&str>, &str, i32)>) -> OrderWithItems {
        let ordered_at = Utc
            .from_utc_datetime(&d(date).and_hms_opt(12, 0, 0).expect("time"));
        OrderWithItems {
            order: OrderRow {
                id,
                organization_id: org(),
                marketplace: "mercado_livre".to_string(),
                source_order_id: format!("ML-{id}"),
                ordered_at,
                created_at: Utc::now(),
            },
            items: items
                .into_iter()
                .enumerate()
                .map(|(i, (sku, price, qty))| OrderItemRow {
                    id: id * 100 + i64::try_from(i).expect("index"),
                    order_id: id,
                    sku: sku.map(ToOwned::to_owned),
                    unit_price: price.parse().expect("price literal"),
                    quantity: qty,
                })
                .collect(),
        }
    }

    fn spend(entries: &[(&str, &str)]) -> HashMap<String, Decimal> {
        entries
            .iter()
            .map(|(c, s)| ((*c).to_string(), s.parse().expect("spend literal")))
            .collect()
    }

    #[test]
    fn single_link_produces_time_window_conversion() {
        // The worked example from the service contract: one link, one order
        // in a one-order window, campaign spend 30, line 20 x 2.
        let links = vec![link(1, "C1", "ABC")];
        let orders = vec![order(10, "2026-03-10", vec![(Some("ABC"), "20", 2)])];
        let spend = spend(&[("C1", "30")]);

        let conversions = compute_conversions(&ComputeInput {
            links: &links,
            orders: &orders,
            spend_by_campaign: &spend,
        });

        assert_eq!(conversions.len(), 1);
        let c = &conversions[0];
        assert_eq!(c.attribution_method, AttributionMethod::TimeWindow);
        assert_eq!(c.attribution_weight, Decimal::ONE);
        assert_eq!(c.order_value, Decimal::from(40));
        assert_eq!(c.attributed_spend, Decimal::from(30));
        assert_eq!(c.quantity, 2);
        assert_eq!(c.conversion_date, d("2026-03-10"));
    }

    #[test]
    fn two_links_split_equally_as_proportional() {
        let links = vec![link(1, "C1", "ABC"), link(2, "C2", "ABC")];
        let orders = vec![order(10, "2026-03-10", vec![(Some("ABC"), "20", 1)])];
        let spend = spend(&[("C1", "30"), ("C2", "10")]);

        let conversions = compute_conversions(&ComputeInput {
            links: &links,
            orders: &orders,
            spend_by_campaign: &spend,
        });

        assert_eq!(conversions.len(), 2);
        let half: Decimal = "0.5".parse().expect("half");
        for c in &conversions {
            assert_eq!(c.attribution_method, AttributionMethod::Proportional);
            assert_eq!(c.attribution_weight, half);
        }
        let c1 = conversions
            .iter()
            .find(|c| c.campaign_id == "C1")
            .expect("C1 conversion");
        assert_eq!(c1.attributed_spend, Decimal::from(15));
        let c2 = conversions
            .iter()
            .find(|c| c.campaign_id == "C2")
            .expect("C2 conversion");
        assert_eq!(c2.attributed_spend, Decimal::from(5));
    }

    #[test]
    fn spend_is_divided_by_total_orders_in_window() {
        // Three orders in the window, only one matches the link; the
        // campaign's spend is still spread over all three.
        let links = vec![link(1, "C1", "ABC")];
        let orders = vec![
            order(10, "2026-03-10", vec![(Some("ABC"), "20", 1)]),
            order(11, "2026-03-10", vec![(Some("ZZZ"), "5", 1)]),
            order(12, "2026-03-09", vec![(Some("YYY"), "5", 1)]),
        ];
        let spend = spend(&[("C1", "30")]);

        let conversions = compute_conversions(&ComputeInput {
            links: &links,
            orders: &orders,
            spend_by_campaign: &spend,
        });

        assert_eq!(conversions.len(), 1);
        assert_eq!(conversions[0].attributed_spend, Decimal::from(10));
    }

    #[test]
    fn lines_without_sku_are_dropped_but_siblings_survive() {
        let links = vec![link(1, "C1", "ABC")];
        let orders = vec![order(
            10,
            "2026-03-10",
            vec![(None, "99", 1), (Some(""), "99", 1), (Some("ABC"), "20", 1)],
        )];
        let spend = spend(&[("C1", "30")]);

        let conversions = compute_conversions(&ComputeInput {
            links: &links,
            orders: &orders,
            spend_by_campaign: &spend,
        });

        assert_eq!(conversions.len(), 1);
        assert_eq!(conversions[0].product_sku, "ABC");
    }

    #[test]
    fn sku_without_matching_link_produces_nothing() {
        let links = vec![link(1, "C1", "ABC")];
        let orders = vec![order(10, "2026-03-10", vec![(Some("OTHER"), "20", 1)])];
        let spend = spend(&[("C1", "30")]);

        let conversions = compute_conversions(&ComputeInput {
            links: &links,
            orders: &orders,
            spend_by_campaign: &spend,
        });

        assert!(conversions.is_empty());
    }

    #[test]
    fn link_validity_window_is_enforced_per_order_date() {
        let mut expired = link(1, "C1", "ABC");
        expired.end_date = Some(d("2026-03-09"));
        let links = vec![expired];
        let orders = vec![order(10, "2026-03-10", vec![(Some("ABC"), "20", 1)])];
        let spend = spend(&[("C1", "30")]);

        let conversions = compute_conversions(&ComputeInput {
            links: &links,
            orders: &orders,
            spend_by_campaign: &spend,
        });
        assert!(conversions.is_empty(), "end_date = D-1 must exclude order dated D");

        // Same link ending exactly on the order date matches.
        let mut ending_today = link(1, "C1", "ABC");
        ending_today.end_date = Some(d("2026-03-10"));
        let links = vec![ending_today];
        let conversions = compute_conversions(&ComputeInput {
            links: &links,
            orders: &orders,
            spend_by_campaign: &spend,
        });
        assert_eq!(conversions.len(), 1);
    }

    #[test]
    fn expired_candidate_does_not_dilute_the_weight() {
        // Two links share the SKU but one is expired; the survivor gets the
        // full weight and the single-match method tag.
        let mut expired = link(1, "C1", "ABC");
        expired.end_date = Some(d("2026-03-01"));
        let links = vec![expired, link(2, "C2", "ABC")];
        let orders = vec![order(10, "2026-03-10", vec![(Some("ABC"), "20", 1)])];
        let spend = spend(&[("C1", "100"), ("C2", "30")]);

        let conversions = compute_conversions(&ComputeInput {
            links: &links,
            orders: &orders,
            spend_by_campaign: &spend,
        });

        assert_eq!(conversions.len(), 1);
        assert_eq!(conversions[0].campaign_id, "C2");
        assert_eq!(conversions[0].attribution_weight, Decimal::ONE);
        assert_eq!(
            conversions[0].attribution_method,
            AttributionMethod::TimeWindow
        );
    }

    #[test]
    fn campaign_without_spend_rows_attributes_zero_spend() {
        let links = vec![link(1, "C1", "ABC")];
        let orders = vec![order(10, "2026-03-10", vec![(Some("ABC"), "20", 1)])];
        let spend = HashMap::new();

        let conversions = compute_conversions(&ComputeInput {
            links: &links,
            orders: &orders,
            spend_by_campaign: &spend,
        });

        assert_eq!(conversions.len(), 1);
        assert_eq!(conversions[0].attributed_spend, Decimal::ZERO);
        assert_eq!(conversions[0].order_value, Decimal::from(20));
    }
}
