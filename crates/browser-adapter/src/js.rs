//! Injected JavaScript snippets
//!
//! All DOM-level reads go through these probes. Selectors and values are
//! embedded via JSON encoding, never string-pasted raw.
//!
//! Selector dialect: plain CSS, plus the ordinal form `role=ROLE >> nth=N`
//! produced by the ordinal discovery strategy. The shared `__find` helper
//! resolves both, so every probe accepts either.

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Shared helpers: role computation, visibility, and the selector-dialect
/// aware `__find` / `__findAll`.
const FIND_HELPER: &str = r#"
    const __implicitRole = (el) => {
        const tag = el.tagName.toLowerCase();
        if (tag === 'button') return 'button';
        if (tag === 'a' && el.hasAttribute('href')) return 'link';
        if (tag === 'select') return 'combobox';
        if (tag === 'textarea') return 'textbox';
        if (tag === 'li') return 'listitem';
        if (tag === 'input') {
            const t = (el.getAttribute('type') || 'text').toLowerCase();
            if (['button', 'submit', 'reset', 'image'].includes(t)) return 'button';
            if (t === 'checkbox') return 'checkbox';
            if (t === 'radio') return 'radio';
            if (t === 'search') return 'searchbox';
            return 'textbox';
        }
        return null;
    };
    const __role = (el) => el.getAttribute('role') || __implicitRole(el);
    const __visible = (el) => {
        const style = window.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden') return false;
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    };
    const __findAll = (selector) => {
        const roleMatch = selector.match(/^role=([\w-]+)\s*>>\s*nth=(\d+)$/);
        if (roleMatch) {
            const family = Array.from(document.querySelectorAll('*'))
                .filter(el => __role(el) === roleMatch[1] && __visible(el));
            const nth = parseInt(roleMatch[2], 10);
            return nth < family.length ? [family[nth]] : [];
        }
        try { return Array.from(document.querySelectorAll(selector)); } catch (_) { return []; }
    };
    const __find = (selector) => __findAll(selector)[0] || null;
"#;

/// Survey interactive elements. `scope` is the accessible name of a
/// container (dialog/form/section); when given, the search is constrained
/// to the first matching container, and an empty result means either an
/// empty or an absent container — callers fall back to global.
pub fn survey_script(scope: Option<&str>) -> String {
    let scope_expr = match scope {
        Some(region) => format!("__findScope({})", quote(region)),
        None => "document".to_string(),
    };
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const __containerName = (node) => (node.getAttribute('aria-label')
                || node.getAttribute('title')
                || ((node.querySelector('h1,h2,h3,legend') || {{}}).textContent)
                || '').trim().toLowerCase();
            const __findScope = (wanted) => {{
                wanted = wanted.trim().toLowerCase();
                const containers = Array.from(document.querySelectorAll(
                    '[role="dialog"], dialog, form, section, fieldset, [role="region"], [role="group"]'));
                return containers.find(c => __containerName(c).includes(wanted)) || null;
            }};
            const root = {scope_expr};
            if (!root) return [];
            const SELECTOR = 'input, textarea, select, button, a[href], [role], [contenteditable], [tabindex]';
            const nodes = Array.from(root.querySelectorAll(SELECTOR));
            const cssEscape = (v) => (window.CSS && CSS.escape) ? CSS.escape(v) : v.replace(/([^a-zA-Z0-9_-])/g, '\\$1');
            const nthPath = (el) => {{
                const parts = [];
                let node = el;
                while (node && node.nodeType === 1 && node !== document.documentElement) {{
                    const tag = node.tagName.toLowerCase();
                    let nth = 1, sib = node;
                    while ((sib = sib.previousElementSibling)) {{
                        if (sib.tagName === node.tagName) nth++;
                    }}
                    parts.unshift(tag + ':nth-of-type(' + nth + ')');
                    node = node.parentElement;
                }}
                return 'html > ' + parts.join(' > ');
            }};
            const canonical = (el) => {{
                if (el.id && document.querySelectorAll('#' + cssEscape(el.id)).length === 1) {{
                    return '#' + cssEscape(el.id);
                }}
                const name = el.getAttribute('name');
                if (name) {{
                    const sel = el.tagName.toLowerCase() + '[name="' + name + '"]';
                    if (document.querySelectorAll(sel).length === 1) return sel;
                }}
                for (const attr of ['data-testid', 'data-test-id', 'data-cy']) {{
                    const v = el.getAttribute(attr);
                    if (v) {{
                        const sel = '[' + attr + '="' + v + '"]';
                        if (document.querySelectorAll(sel).length === 1) return sel;
                    }}
                }}
                return nthPath(el);
            }};
            const accessibleName = (el) => {{
                const label = el.getAttribute('aria-label');
                if (label) return label.trim();
                const labelledby = el.getAttribute('aria-labelledby');
                if (labelledby) {{
                    return labelledby.split(/\s+/)
                        .map(id => document.getElementById(id))
                        .map(n => n ? (n.textContent || '') : '')
                        .join(' ').trim();
                }}
                if (el.id) {{
                    const forLabel = document.querySelector('label[for="' + cssEscape(el.id) + '"]');
                    if (forLabel) return (forLabel.textContent || '').trim();
                }}
                return (el.innerText || el.textContent || '').trim().slice(0, 120);
            }};
            const labelFor = (el) => {{
                if (!el.id) return null;
                const label = document.querySelector('label[for="' + cssEscape(el.id) + '"]');
                return label ? (label.textContent || '').trim() : null;
            }};
            return nodes.map(el => {{
                const testIds = {{}};
                for (const attr of ['data-testid', 'data-test-id', 'data-cy']) {{
                    const v = el.getAttribute(attr);
                    if (v) testIds[attr] = v;
                }}
                return {{
                    selector: canonical(el),
                    tag: el.tagName.toLowerCase(),
                    input_type: el.getAttribute('type'),
                    aria_label: el.getAttribute('aria-label'),
                    aria_placeholder: el.getAttribute('aria-placeholder'),
                    name: el.getAttribute('name'),
                    placeholder: el.getAttribute('placeholder'),
                    id: el.id || null,
                    classes: Array.from(el.classList),
                    role: __role(el),
                    accessible_name: accessibleName(el) || null,
                    test_ids: testIds,
                    label_text: labelFor(el),
                    text: (el.innerText || '').trim().slice(0, 120) || null,
                    visible: __visible(el),
                    enabled: !el.disabled && el.getAttribute('aria-disabled') !== 'true',
                }};
            }});
        }})()"#
    )
}

pub fn query_count_script(selector: &str) -> String {
    format!(
        "(() => {{ {FIND_HELPER} return __findAll({sel}).length; }})()",
        sel = quote(selector)
    )
}

pub fn element_state_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = __find({sel});
            if (!el) return null;
            const rect = el.getBoundingClientRect();
            const inViewport = rect.bottom > 0 && rect.right > 0
                && rect.top < window.innerHeight && rect.left < window.innerWidth;
            return {{
                visible: __visible(el),
                enabled: !el.disabled,
                aria_disabled: el.getAttribute('aria-disabled') === 'true',
                in_viewport: inViewport,
            }};
        }})()"#,
        sel = quote(selector)
    )
}

pub fn bounding_box_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = __find({sel});
            if (!el) return null;
            const rect = el.getBoundingClientRect();
            return {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }};
        }})()"#,
        sel = quote(selector)
    )
}

/// Resolve whatever `selector` addresses and return a canonical CSS
/// selector for it, so ordinal locators can be handed to native input
/// paths.
pub fn canonicalize_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = __find({sel});
            if (!el) return null;
            const cssEscape = (v) => (window.CSS && CSS.escape) ? CSS.escape(v) : v.replace(/([^a-zA-Z0-9_-])/g, '\\$1');
            if (el.id) return '#' + cssEscape(el.id);
            const parts = [];
            let node = el;
            while (node && node.nodeType === 1 && node !== document.documentElement) {{
                const tag = node.tagName.toLowerCase();
                let nth = 1, sib = node;
                while ((sib = sib.previousElementSibling)) {{
                    if (sib.tagName === node.tagName) nth++;
                }}
                parts.unshift(tag + ':nth-of-type(' + nth + ')');
                node = node.parentElement;
            }}
            return 'html > ' + parts.join(' > ');
        }})()"#,
        sel = quote(selector)
    )
}

/// Whether the element sits inside a container (dialog/form/section/region)
/// whose accessible name contains `region`, case-insensitively.
pub fn in_scope_script(selector: &str, region: &str) -> String {
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = __find({sel});
            if (!el) return false;
            const wanted = {region}.trim().toLowerCase();
            let node = el.parentElement;
            while (node) {{
                const role = node.getAttribute && (node.getAttribute('role') || '');
                const tag = node.tagName ? node.tagName.toLowerCase() : '';
                if (['dialog', 'form', 'region', 'group'].includes(role)
                    || ['dialog', 'form', 'section', 'fieldset'].includes(tag)) {{
                    const name = (node.getAttribute('aria-label')
                        || node.getAttribute('title')
                        || ((node.querySelector('h1,h2,h3,legend') || {{}}).textContent)
                        || '').trim().toLowerCase();
                    if (name.includes(wanted)) return true;
                }}
                node = node.parentElement;
            }}
            return false;
        }})()"#,
        sel = quote(selector),
        region = quote(region)
    )
}

/// Set an input value the way a user would: native setter + input/change
/// events, so framework bindings observe it.
pub fn fill_script(selector: &str, value: &str) -> String {
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = __find({sel});
            if (!el) return false;
            el.focus();
            const proto = el.tagName === 'TEXTAREA'
                ? window.HTMLTextAreaElement.prototype
                : window.HTMLInputElement.prototype;
            const setter = Object.getOwnPropertyDescriptor(proto, 'value');
            if (setter && setter.set) {{ setter.set.call(el, {val}); }} else {{ el.value = {val}; }}
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        sel = quote(selector),
        val = quote(value)
    )
}

/// Dispatch one key. Enter inside a form also submits, matching native
/// behavior.
pub fn press_script(selector: Option<&str>, key: &str) -> String {
    let target = match selector {
        Some(sel) => format!("__find({})", quote(sel)),
        None => "document.activeElement".to_string(),
    };
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = {target};
            if (!el) return false;
            const key = {key};
            const opts = {{ key, bubbles: true, cancelable: true }};
            const proceed = el.dispatchEvent(new KeyboardEvent('keydown', opts));
            el.dispatchEvent(new KeyboardEvent('keypress', opts));
            el.dispatchEvent(new KeyboardEvent('keyup', opts));
            if (proceed && key === 'Enter' && el.form) {{
                if (el.form.requestSubmit) {{ el.form.requestSubmit(); }} else {{ el.form.submit(); }}
            }}
            return true;
        }})()"#,
        key = quote(key)
    )
}

pub fn click_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = __find({sel});
            if (!el) return false;
            el.click();
            return true;
        }})()"#,
        sel = quote(selector)
    )
}

pub fn select_option_script(selector: &str, value: &str) -> String {
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = __find({sel});
            if (!el || el.tagName !== 'SELECT') return false;
            const wanted = {val}.trim().toLowerCase();
            const option = Array.from(el.options).find(o =>
                o.value.toLowerCase() === wanted || o.textContent.trim().toLowerCase() === wanted);
            if (!option) return false;
            el.value = option.value;
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        sel = quote(selector),
        val = quote(value)
    )
}

pub fn set_checked_script(selector: &str, checked: bool) -> String {
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = __find({sel});
            if (!el) return false;
            if (el.checked !== {checked}) {{ el.click(); }}
            return el.checked === {checked};
        }})()"#,
        sel = quote(selector)
    )
}

pub fn inner_text_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = __find({sel});
            if (!el) return null;
            return (el.innerText || el.textContent || '').trim();
        }})()"#,
        sel = quote(selector)
    )
}

pub const BODY_TEXT_SCRIPT: &str =
    "(() => (document.body ? (document.body.innerText || '') : ''))()";

/// Structural skeleton: tag names plus landmark attributes, depth-first,
/// text content excluded. Drift detection hashes this.
pub const DOM_SKELETON_SCRIPT: &str = r#"(() => {
    const parts = [];
    const walk = (node, depth) => {
        if (!node || node.nodeType !== 1 || depth > 12) return;
        let part = node.tagName.toLowerCase();
        if (node.id) part += '#' + node.id;
        const role = node.getAttribute('role');
        if (role) part += '@' + role;
        const name = node.getAttribute('name');
        if (name) part += '!' + name;
        parts.push(part);
        for (const child of node.children) walk(child, depth + 1);
    };
    walk(document.documentElement, 0);
    return parts.join('|');
})()"#;

pub fn scroll_into_view_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            {FIND_HELPER}
            const el = __find({sel});
            if (!el) return false;
            el.scrollIntoView({{ block: 'center', inline: 'center' }});
            return true;
        }})()"#,
        sel = quote(selector)
    )
}

pub fn scroll_by_script(dy: i64) -> String {
    format!("(() => {{ window.scrollBy(0, {dy}); return true; }})()")
}

/// Install a mutation counter on the window; read it back later with
/// [`MUTATION_READ_SCRIPT`]. Two-phase so no promise crosses the bridge.
pub const MUTATION_INSTALL_SCRIPT: &str = r#"(() => {
    if (window.__wpMutations) { window.__wpMutations.count = 0; return true; }
    const state = { count: 0 };
    const observer = new MutationObserver(records => { state.count += records.length; });
    observer.observe(document.documentElement, {
        childList: true, subtree: true, attributes: true, characterData: true,
    });
    window.__wpMutations = state;
    return true;
})()"#;

pub const MUTATION_READ_SCRIPT: &str =
    "(() => (window.__wpMutations ? window.__wpMutations.count : 0))()";

/// Resource-count probe used to poll for network quiet.
pub const RESOURCE_COUNT_SCRIPT: &str =
    "(() => performance.getEntriesByType('resource').length)()";

pub const READY_STATE_SCRIPT: &str = "(() => document.readyState)()";

/// Whether `selector` addresses an ordinal locator rather than CSS.
pub fn is_role_selector(selector: &str) -> bool {
    selector.starts_with("role=")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_json_quoted() {
        let script = query_count_script("input[name=\"q\"]");
        assert!(script.contains("input[name=\\\"q\\\"]"));
    }

    #[test]
    fn survey_scopes_to_container() {
        let global = survey_script(None);
        assert!(global.contains("const root = document;"));
        let scoped = survey_script(Some("New Account"));
        assert!(scoped.contains("__findScope("));
    }

    #[test]
    fn role_selectors_are_recognized() {
        assert!(is_role_selector("role=link >> nth=0"));
        assert!(!is_role_selector("#search"));
    }
}
