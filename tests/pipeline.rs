// End-to-end reconstruction runs over a small demographic scenario.

mod common;
mod util;

mod pipeline_tests {
    use super::common::coord;
    use super::util::*;
    use synthpop_kernels::kernels::reconstruction::{direct, hierarchical, ipf};
    use synthpop_kernels::prelude::*;

    /// age (range) with an aggregated age_group, sex, and occupation that is
    /// not applicable to toddlers.
    fn scenario() -> AttributeRegistry {
        let mut reg = AttributeRegistry::new();
        let age = reg
            .register_range("age", &[(0.0, 5.0), (5.0, 18.0), (18.0, 65.0)])
            .unwrap();
        reg.register_aggregated(
            "age_group",
            &age,
            &[("minor", &["0:5", "5:18"][..]), ("adult", &["18:65"][..])],
        )
        .unwrap();
        reg.register_unique("sex", &["m", "f"]).unwrap();
        reg.register_unique("occupation", &["student", "worker"]).unwrap();
        let toddler = reg.value("age", "0:5").unwrap();
        reg.add_empty_correlate(toddler, &[AttributeId::new("occupation")])
            .unwrap();
        reg
    }

    fn age_sex(reg: &AttributeRegistry) -> FullMatrix {
        let mut m = FullMatrix::new(
            vec![AttributeId::new("age_group"), AttributeId::new("sex")],
            NumericKind::Integer,
            MetaDataType::ContingencyTable,
        )
        .unwrap();
        for (g, s, n) in [("minor", "m", 20), ("minor", "f", 20), ("adult", "m", 30), ("adult", "f", 30)] {
            m.add_value(coord(reg, &[("age_group", g), ("sex", s)]), Control::Integer(n))
                .unwrap();
        }
        m
    }

    fn age_occupation(reg: &AttributeRegistry) -> FullMatrix {
        let mut m = FullMatrix::new(
            vec![AttributeId::new("age"), AttributeId::new("occupation")],
            NumericKind::Integer,
            MetaDataType::ContingencyTable,
        )
        .unwrap();
        for (a, o, n) in [("0:5", "", 10), ("5:18", "student", 10), ("18:65", "student", 5), ("18:65", "worker", 15)] {
            m.add_value(coord(reg, &[("age", a), ("occupation", o)]), Control::Integer(n))
                .unwrap();
        }
        m
    }

    #[test]
    fn direct_over_aggregated_and_empty_correlates() {
        init_tracing();
        let reg = scenario();
        let s = SegmentedMatrix::new(vec![age_sex(&reg), age_occupation(&reg)]).unwrap();
        assert!(s.is_segmented());

        let out = direct::reconstruct(&s, &reg, &DirectConfig::default()).unwrap();
        let dims: Vec<&str> = out.dimensions().iter().map(|d| d.name()).collect();
        assert_eq!(dims, vec!["age", "occupation", "sex"]);
        assert_close(out.total().value(), 1.0, 1e-9);

        // Toddlers only ever appear with an empty occupation.
        let toddler = reg.value("age", "0:5").unwrap();
        for (c, _) in out.cells().filter(|(c, _)| c.contains(&toddler)) {
            assert!(c.get(&AttributeId::new("occupation")).unwrap().is_empty());
        }
        // Folding spreads minors evenly over 0:5 and 5:18.
        let toddlers = out.get_marginal(&[toddler]).unwrap().value();
        assert_close(toddlers, 0.2, 1e-9);
    }

    #[test]
    fn hierarchical_draws_follow_sources() {
        let reg = scenario();
        let s = SegmentedMatrix::new(vec![age_sex(&reg), age_occupation(&reg)]).unwrap();
        let cfg = ReconstructionConfig {
            sampler: SamplerConfig::seeded(99),
            ..ReconstructionConfig::default()
        };
        let sampler = hierarchical::sampler(&s, &reg, &cfg).unwrap();
        let draws = sampler.draw_n(50_000);
        assert!(draws.iter().all(|c| c.len() == 3));

        let toddler = reg.value("age", "0:5").unwrap();
        let empty = reg.value("occupation", "").unwrap();
        for c in draws.iter().filter(|c| c.contains(&toddler)) {
            assert!(c.contains(&empty));
        }
        let adult = reg.value("age", "18:65").unwrap();
        let share = share_of(&draws, &adult);
        assert!((share - 0.6).abs() < 0.01, "adult share {share}");
    }

    #[test]
    fn ipf_sampler_from_json_config() {
        let reg = scenario();
        let cfg = ReconstructionConfig::from_json(
            r#"{ "ipf": { "max_iterations": 50 }, "sampler": { "seed": 3, "strategy": "alias" } }"#,
        )
        .unwrap();

        let mut seed = FullMatrix::new(
            vec![AttributeId::new("sex"), AttributeId::new("occupation")],
            NumericKind::Integer,
            MetaDataType::Sample,
        )
        .unwrap();
        for (s, o, n) in [("m", "student", 2), ("m", "worker", 6), ("f", "student", 3), ("f", "worker", 4)] {
            seed.add_value(coord(&reg, &[("sex", s), ("occupation", o)]), Control::Integer(n))
                .unwrap();
        }
        let mut joint = FullMatrix::new(
            vec![AttributeId::new("sex"), AttributeId::new("age_group")],
            NumericKind::Integer,
            MetaDataType::ContingencyTable,
        )
        .unwrap();
        for (s, g, n) in [("m", "minor", 10), ("m", "adult", 40), ("f", "minor", 10), ("f", "adult", 40)] {
            joint.add_value(coord(&reg, &[("sex", s), ("age_group", g)]), Control::Integer(n))
                .unwrap();
        }
        let targets = IpfTargets::from_joint(&joint, &seed).unwrap();
        assert_eq!(targets.len(), 1);

        let fitted = ipf::fit(&seed, &targets, &cfg.ipf).unwrap().require_convergence().unwrap();
        let male = fitted.get_marginal(&[reg.value("sex", "m").unwrap()]).unwrap().value();
        assert_close(male, 50.0, 1e-6);

        let sampler = ipf::sampler(&seed, &targets, &cfg).unwrap();
        let draws = sampler.draw_n(20_000);
        let m_share = share_of(&draws, &reg.value("sex", "m").unwrap());
        assert!((m_share - 0.5).abs() < 0.02, "male share {m_share}");
        assert!(sampler.to_csv(';').unwrap().starts_with("occupation;sex;value"));
    }

    #[test]
    fn theoretical_size_guard_is_configurable() {
        let reg = scenario();
        let s = SegmentedMatrix::new(vec![age_sex(&reg), age_occupation(&reg)]).unwrap();
        // age 3 x occupation 2 x sex 2
        assert_eq!(direct::theoretical_size(&s, &reg).unwrap(), 12);
        let cfg = DirectConfig { max_theoretical_size: 11 };
        assert!(matches!(
            direct::reconstruct(&s, &reg, &cfg).unwrap_err(),
            ReconstructionError::TheoreticalSizeExceeded { size: 12, limit: 11 }
        ));
    }
}
