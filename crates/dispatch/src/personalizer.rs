//! Per-segment content variants. Pure functions, no I/O.

use courier_core::types::{Customer, SegmentTag};

/// Render the message body for one customer of one segment.
///
/// Total and deterministic: every tag has a variant (`General` is the
/// default), and the output always embeds the customer's display name and
/// the campaign body verbatim.
pub fn personalize(body: &str, customer: &Customer, tag: SegmentTag) -> String {
    let name = customer.display_name();

    match tag {
        SegmentTag::Premium => format!(
            "Olá {name}!\n\n\
             Como cliente Premium, você tem acesso exclusivo a esta promoção!\n\n\
             {body}\n\n\
             🎯 Benefícios Premium:\n\
             - Desconto adicional de 5%\n\
             - Frete grátis em todos os pedidos\n\
             - Atendimento prioritário\n\n\
             Aproveite esta oferta por tempo limitado!"
        ),
        SegmentTag::SouthRegion => format!(
            "Olá {name}!\n\n\
             Promoção especial para a região Sul!\n\n\
             {body}\n\n\
             🌟 Vantagens regionais:\n\
             - Frete grátis para a sua região\n\
             - Entrega expressa disponível\n\
             - Descontos em pedidos locais\n\n\
             Não perca esta oportunidade!"
        ),
        SegmentTag::General => format!(
            "Olá {name}!\n\n\
             {body}\n\n\
             📦 Aproveite nossas ofertas e economize nas suas entregas!\n\n\
             Equipe de Logística"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(name: Option<&str>) -> Customer {
        Customer {
            id: Some("1".into()),
            name: name.map(String::from),
            email: Some("a@x.com".into()),
            region: None,
        }
    }

    #[test]
    fn test_every_variant_embeds_name_and_body() {
        let body = "Black Friday: até 50% OFF em entregas";
        for tag in [SegmentTag::Premium, SegmentTag::SouthRegion, SegmentTag::General] {
            let text = personalize(body, &customer(Some("Maria Santos")), tag);
            assert!(text.contains("Maria Santos"), "{tag} lacks name");
            assert!(text.contains(body), "{tag} lacks body");
        }
    }

    #[test]
    fn test_deterministic() {
        let c = customer(Some("João"));
        assert_eq!(
            personalize("Z", &c, SegmentTag::Premium),
            personalize("Z", &c, SegmentTag::Premium)
        );
    }

    #[test]
    fn test_variants_differ() {
        let c = customer(Some("A"));
        let premium = personalize("Z", &c, SegmentTag::Premium);
        let south = personalize("Z", &c, SegmentTag::SouthRegion);
        let general = personalize("Z", &c, SegmentTag::General);
        assert!(premium.contains("Premium"));
        assert!(south.contains("região Sul"));
        assert_ne!(premium, general);
        assert_ne!(south, general);
    }

    #[test]
    fn test_missing_name_uses_default() {
        let text = personalize("Z", &customer(None), SegmentTag::General);
        assert!(text.starts_with("Olá Cliente!"));
    }

    #[test]
    fn test_unknown_tag_renders_general() {
        let c = customer(Some("A"));
        assert_eq!(
            personalize("Z", &c, SegmentTag::resolve("vip-gold")),
            personalize("Z", &c, SegmentTag::General)
        );
    }
}
