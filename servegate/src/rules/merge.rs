use super::compiled::RuleSet;
use super::types::RuleSpec;

impl RuleSet {
    /// Fold rule layers into one effective rule set.
    ///
    /// Layers are ordered least specific first (directory) to most specific
    /// last (file). List fields accumulate across layers, the header map is
    /// unioned, and a later non-empty scalar overwrites an earlier one.
    pub fn merge<'a, I>(layers: I) -> RuleSet
    where
        I: IntoIterator<Item = &'a RuleSet>,
    {
        let mut target = RuleSet::default();
        for layer in layers {
            target.absorb(layer);
        }
        target
    }

    fn absorb(&mut self, src: &RuleSet) {
        merge_spec(&mut self.spec, &src.spec);

        self.authorized_user_agents.extend(src.authorized_user_agents.iter().cloned());
        self.blacklist_user_agents.extend(src.blacklist_user_agents.iter().cloned());
        self.authorized_ip_range.extend(src.authorized_ip_range.iter().cloned());
        self.blacklist_ip_range.extend(src.blacklist_ip_range.iter().cloned());
    }
}

fn merge_spec(dst: &mut RuleSpec, src: &RuleSpec) {
    dst.authorized_user_agents.extend(src.authorized_user_agents.iter().cloned());
    dst.blacklist_user_agents.extend(src.blacklist_user_agents.iter().cloned());
    dst.authorized_ip_range.extend(src.authorized_ip_range.iter().cloned());
    dst.blacklist_ip_range.extend(src.blacklist_ip_range.iter().cloned());
    dst.authorized_methods.extend(src.authorized_methods.iter().cloned());
    dst.authorized_ja3.extend(src.authorized_ja3.iter().cloned());
    dst.prereq_paths.extend(src.prereq_paths.iter().cloned());

    for (k, v) in &src.authorized_headers {
        dst.authorized_headers.insert(k.clone(), v.clone());
    }

    // zero values never overwrite
    if src.not_serving {
        dst.not_serving = true;
    }
    if src.serve != 0 {
        dst.serve = src.serve;
    }
    if !src.exec.script_path.is_empty() {
        dst.exec.script_path = src.exec.script_path.clone();
    }
    if !src.exec.output.is_empty() {
        dst.exec.output = src.exec.output.clone();
    }
    if !src.geoip.authorized_countries.is_empty() {
        dst.geoip.authorized_countries = src.geoip.authorized_countries.clone();
    }
    if !src.geoip.blacklist_countries.is_empty() {
        dst.geoip.blacklist_countries = src.geoip.blacklist_countries.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn layer(yaml: &str) -> RuleSet {
        RuleSet::load(yaml).unwrap()
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        let merged = RuleSet::merge(std::iter::empty::<&RuleSet>());
        assert!(merged.is_unrestricted());
    }

    #[test]
    fn scalar_fields_last_write_wins() {
        let merged = RuleSet::merge(&[layer("serve: 5"), layer("serve: 10")]);
        assert_eq!(merged.spec().serve, 10);

        let merged = RuleSet::merge(&[layer("serve: 5"), layer("authorized_methods: [GET]")]);
        assert_eq!(merged.spec().serve, 5);
    }

    #[test]
    fn false_kill_switch_does_not_reenable() {
        let merged = RuleSet::merge(&[layer("not_serving: true"), layer("not_serving: false")]);
        assert!(merged.spec().not_serving);
    }

    #[test]
    fn exec_and_geoip_overwrite_per_field() {
        let merged = RuleSet::merge(&[
            layer("exec: {script: /a.sh, output: one}\ngeoip: {authorized_countries: [US], blacklist_countries: [RU]}"),
            layer("exec: {output: two}\ngeoip: {authorized_countries: [DE]}"),
        ]);
        assert_eq!(merged.spec().exec.script_path, "/a.sh");
        assert_eq!(merged.spec().exec.output, "two");
        assert_eq!(merged.spec().geoip.authorized_countries, vec!["DE"]);
        assert_eq!(merged.spec().geoip.blacklist_countries, vec!["RU"]);
    }

    #[test]
    fn list_fields_append_in_layer_order() {
        let merged = RuleSet::merge(&[
            layer("authorized_methods: [GET]\nblacklist_useragents: [bot]\nprereq: [/a]"),
            layer("authorized_methods: [POST]\nblacklist_useragents: [spider]\nprereq: [/b]"),
        ]);
        assert_eq!(merged.spec().authorized_methods, vec!["GET", "POST"]);
        assert_eq!(merged.spec().prereq_paths, vec!["/a", "/b"]);
        let compiled: Vec<&str> = merged.blacklist_user_agents.iter().map(|r| r.as_str()).collect();
        assert_eq!(compiled, vec!["bot", "spider"]);
    }

    #[test]
    fn header_maps_union_with_later_override() {
        let merged = RuleSet::merge(&[
            layer("authorized_headers: {X-A: '1', X-B: '2'}"),
            layer("authorized_headers: {X-B: '3'}"),
        ]);
        let h = &merged.spec().authorized_headers;
        assert_eq!(h.len(), 2);
        assert_eq!(h["X-A"], "1");
        assert_eq!(h["X-B"], "3");
    }

    #[test]
    fn list_union_is_associative() {
        let a = layer("authorized_iprange: [10.0.0.0/8]\nauthorized_ja3: [aa]");
        let b = layer("authorized_iprange: [10.1.0.0/16]");
        let c = layer("authorized_iprange: [1.2.3.4]\nauthorized_ja3: [bb]");

        let left = RuleSet::merge(&[RuleSet::merge(&[a.clone(), b.clone()]), c.clone()]);
        let right = RuleSet::merge(&[a, RuleSet::merge(&[b, c])]);

        assert_eq!(left.spec(), right.spec());
        assert_eq!(left.authorized_ip_range, right.authorized_ip_range);
    }
}
