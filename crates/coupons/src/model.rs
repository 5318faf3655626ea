use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CouponKind {
    #[serde(rename = "percentual")]
    Percentage,
    #[serde(rename = "frete_gratis")]
    FreeShipping,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CouponStatus {
    #[serde(rename = "disponivel")]
    Available,
    #[serde(rename = "esgotado")]
    Exhausted,
    /// Set by operators only. Redemption never produces it.
    #[serde(rename = "inativo")]
    Inactive,
}

impl CouponStatus {
    pub const ALL: [CouponStatus; 3] = [
        CouponStatus::Available,
        CouponStatus::Exhausted,
        CouponStatus::Inactive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Available => "disponivel",
            CouponStatus::Exhausted => "esgotado",
            CouponStatus::Inactive => "inativo",
        }
    }
}

impl std::fmt::Display for CouponStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    #[serde(rename = "cupom_id")]
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "descricao", default)]
    pub description: String,
    #[serde(rename = "tipo")]
    pub kind: CouponKind,
    #[serde(rename = "valor")]
    pub value: f64,
    #[serde(rename = "valor_minimo", default)]
    pub min_order_value: f64,
    pub status: CouponStatus,
    #[serde(rename = "uso_atual", default)]
    pub usage_count: u32,
    #[serde(rename = "uso_maximo")]
    pub usage_max: u32,
    #[serde(rename = "data_criacao")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "data_expiracao")]
    pub expires_at: DateTime<Utc>,
}

impl Coupon {
    /// Discount as a fraction: `valor / 100` for percentage coupons, zero
    /// for free shipping.
    pub fn discount(&self) -> f64 {
        match self.kind {
            CouponKind::Percentage => self.value / 100.0,
            CouponKind::FreeShipping => 0.0,
        }
    }

    pub fn remaining_uses(&self) -> u32 {
        self.usage_max.saturating_sub(self.usage_count)
    }

    /// The record after one more redemption, with the status derived from
    /// the new usage count.
    pub fn redeemed(&self) -> Coupon {
        let usage_count = self.usage_count + 1;
        let status = if usage_count >= self.usage_max {
            CouponStatus::Exhausted
        } else {
            CouponStatus::Available
        };
        Coupon {
            usage_count,
            status,
            ..self.clone()
        }
    }
}

/// Client-facing view of a single coupon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CouponView {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "desconto")]
    pub discount: f64,
    #[serde(rename = "usos_restantes")]
    pub remaining_uses: u32,
    pub status: CouponStatus,
}

impl From<&Coupon> for CouponView {
    fn from(coupon: &Coupon) -> Self {
        Self {
            code: coupon.id.clone(),
            discount: coupon.discount(),
            remaining_uses: coupon.remaining_uses(),
            status: coupon.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CouponListing {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "desconto")]
    pub discount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableCoupons {
    #[serde(rename = "cupons")]
    pub coupons: Vec<CouponListing>,
    pub total: usize,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn coupon(kind: CouponKind, value: f64, usage: u32, max: u32) -> Coupon {
        Coupon {
            id: "C".into(),
            name: "C".into(),
            description: String::new(),
            kind,
            value,
            min_order_value: 0.0,
            status: CouponStatus::Available,
            usage_count: usage,
            usage_max: max,
            created_at: Utc::now(),
            expires_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_by_kind() {
        assert_eq!(coupon(CouponKind::Percentage, 25.0, 0, 1).discount(), 0.25);
        assert_eq!(coupon(CouponKind::FreeShipping, 10.0, 0, 1).discount(), 0.0);
    }

    #[test]
    fn test_redeemed_derives_status() {
        let next = coupon(CouponKind::Percentage, 10.0, 98, 100).redeemed();
        assert_eq!(next.usage_count, 99);
        assert_eq!(next.status, CouponStatus::Available);

        let last = next.redeemed();
        assert_eq!(last.usage_count, 100);
        assert_eq!(last.status, CouponStatus::Exhausted);
        assert_eq!(last.remaining_uses(), 0);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(coupon(CouponKind::FreeShipping, 0.0, 5, 200)).unwrap();
        assert_eq!(json["tipo"], "frete_gratis");
        assert_eq!(json["status"], "disponivel");
        assert_eq!(json["uso_atual"], 5);
        assert_eq!(json["uso_maximo"], 200);

        let view = CouponView::from(&coupon(CouponKind::Percentage, 10.0, 99, 100));
        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["codigo"], "C");
        assert_eq!(json["desconto"], 0.1);
        assert_eq!(json["usos_restantes"], 1);
    }
}
